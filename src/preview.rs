use crate::plan::Plan;
use colored::Colorize;
use std::{collections::BTreeMap, fmt::Write, path::Component};

/// A node of the destination tree: a directory with children, or a planned file.
#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    /// `Some(overwrites)` for planned files.
    file: Option<bool>,
}
impl TreeNode {
    fn insert(&mut self, segments: &[String], overwrites: bool) {
        match segments {
            [] => {}
            [name] => {
                self.children.entry(name.clone()).or_default().file = Some(overwrites);
            }
            [name, rest @ ..] => self
                .children
                .entry(name.clone())
                .or_default()
                .insert(rest, overwrites),
        }
    }
}

/// Build the destination tree from the plan entries.
fn build_tree(plan: &Plan) -> TreeNode {
    let mut root = TreeNode::default();

    for entry in &plan.entries {
        let Ok(relative) = entry.destination.strip_prefix(&plan.destination_root) else {
            log::debug!(
                "{} is outside of {}",
                entry.destination.display(),
                plan.destination_root.display()
            );
            continue;
        };

        let segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        root.insert(&segments, entry.overwrites);
    }

    root
}

fn write_children(out: &mut String, node: &TreeNode, prefix: &str) {
    let len = node.children.len();
    for (i, (name, child)) in node.children.iter().enumerate() {
        let is_last = i == len - 1;

        let connector = if is_last { "└── " } else { "├── " };
        let label = match child.file {
            Some(true) => format!("{} {}", name.yellow(), "(overwrite)".yellow()),
            Some(false) => name.green().to_string(),
            None => name.blue().to_string(),
        };
        let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector.yellow(), label);

        let child_prefix = if is_last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };
        write_children(out, child, &child_prefix);
    }
}

/// Renders the plan as a tree rooted at the destination directory.
pub fn render_preview(plan: &Plan) -> String {
    let tree = build_tree(plan);
    let mut out = String::new();

    let _ = writeln!(out, "{}", plan.destination_root.display().to_string().blue());
    write_children(&mut out, &tree, "");

    out
}

/// Prints what a tree render would write, without writing anything.
pub fn preview_plan(plan: &Plan) {
    println!(
        "Legend: {} = (directory), {} = (new file), {} = (overwritten file)",
        "blue".blue(),
        "green".green(),
        "yellow".yellow()
    );

    let fancy_prompt = format!("{} {}\n", "┌─".bold().bright_blue(), "Preview".bold().bright_blue());
    println!("{}", fancy_prompt);

    print!("{}", render_preview(plan));

    println!(
        "\n{} {}",
        "└─".bold().bright_blue(),
        format!("{} files would be rendered", plan.len()).bright_green()
    );
}
