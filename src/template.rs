use crate::vars::Vars;
use miette::Diagnostic;
use std::io::Write;
use tera::Tera;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("can't parse template {name:?}")]
    #[diagnostic(
        code(temple::template::parse),
        help("Check the template syntax, see https://keats.github.io/tera/docs/#templates")
    )]
    Parse {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("can't render template {name:?}")]
    #[diagnostic(
        code(temple::template::render),
        help("Every variable used by the template must be passed with --var")
    )]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

/// A single compiled template.
///
/// Every template lives in its own [`Tera`] instance, so renders of distinct files share
/// nothing but the read-only [`Vars`].
pub struct Template {
    name: String,
    tera: Tera,
}
impl Template {
    /// Parses `text` as a template registered under `name`.
    ///
    /// Auto-escaping is turned off: output is written exactly as the template says, whatever
    /// the file extension.
    pub fn compile(name: &str, text: &str) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.add_raw_template(name, text)
            .map_err(|error| TemplateError::Parse {
                name: name.to_string(),
                source: error,
            })?;

        Ok(Self {
            name: name.to_string(),
            tera,
        })
    }

    /// Streams the rendered template into `writer`.
    ///
    /// Output already written when an error occurs is left as is.
    pub fn render_to<W: Write>(&self, vars: &Vars, writer: W) -> Result<(), TemplateError> {
        let ctx = vars.to_context();

        self.tera
            .render_to(&self.name, &ctx, writer)
            .map_err(|error| TemplateError::Render {
                name: self.name.clone(),
                source: error,
            })
    }

    pub fn render(&self, vars: &Vars) -> Result<String, TemplateError> {
        let mut out = Vec::new();
        self.render_to(vars, &mut out)?;

        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_placeholders_is_unchanged() {
        let text = "plain text\n  with spacing\t and <html> & \"quotes\"\n\n";
        let template = Template::compile("index.html", text).unwrap();

        let rendered = template.render(&Vars::default()).unwrap();

        assert_eq!(rendered, text);
    }

    #[test]
    fn test_render_substitutes_variable() {
        let vars = Vars::parse(&["hello=world"]).unwrap();
        let template = Template::compile("src.tpl.json", r#"{"hello": "{{ hello }}"}"#).unwrap();

        let rendered = template.render(&vars).unwrap();

        assert_eq!(rendered, r#"{"hello": "world"}"#);
    }

    #[test]
    fn test_render_control_structures() {
        let vars = Vars::parse(&["name=temple", "loud=yes"]).unwrap();
        let template = Template::compile(
            "greeting",
            "{% if loud == \"yes\" %}{{ name | upper }}{% else %}{{ name }}{% endif %}",
        )
        .unwrap();

        assert_eq!(template.render(&vars).unwrap(), "TEMPLE");
    }

    #[test]
    fn test_compile_syntax_error() {
        let err = Template::compile("broken.txt", "{{ unclosed").err().unwrap();

        assert!(matches!(err, TemplateError::Parse { ref name, .. } if name == "broken.txt"));
    }

    #[test]
    fn test_render_undefined_variable() {
        let template = Template::compile("missing", "{{ nope }}").unwrap();

        let err = template.render(&Vars::default()).unwrap_err();

        assert!(matches!(err, TemplateError::Render { ref name, .. } if name == "missing"));
    }
}
