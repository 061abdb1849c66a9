use crate::catalog::{Category, CommandEntry};
use crate::reference::{NumberLiteral, ReferenceToken};
use crate::resolver::ResolvedLocation;

pub(crate) fn sanitize_markdown(value: &str) -> String {
    value.trim().replace('|', "\\|")
}

pub(crate) fn format_command_hover(entry: &CommandEntry) -> String {
    let mut lines = vec![format!(
        "**{}** `{}`",
        sanitize_markdown(&entry.name),
        entry.opcode_label()
    )];
    if entry.category != Category::Command {
        lines.push(format!("_{}_", entry.category.label()));
    }

    if !entry.parameters.is_empty() {
        lines.push(String::new());
        lines.push("**Parameters**".to_string());
        lines.push(String::new());
        for (idx, parameter) in entry.parameters.iter().enumerate() {
            let label = if parameter.trim().is_empty() {
                format!("arg{}", idx + 1)
            } else {
                sanitize_markdown(parameter)
            };
            lines.push(format!("- {}", label));
        }
    }

    if !entry.description.trim().is_empty() {
        lines.push(String::new());
        lines.push(entry.description.trim().to_string());
    }
    if !entry.notes.trim().is_empty() {
        lines.push(String::new());
        lines.push(format!("_Notes:_ {}", entry.notes.trim()));
    }

    lines.join("\n")
}

pub(crate) fn format_number_hover(
    number: NumberLiteral,
    word: &str,
    opcode: Option<&CommandEntry>,
) -> String {
    let conversion = number.describe(word);
    match opcode {
        Some(entry) => format!(
            "{}\n\nOpcode of **{}**",
            conversion,
            sanitize_markdown(&entry.name)
        ),
        None => conversion,
    }
}

pub(crate) fn format_reference_hover(token: &ReferenceToken, resolved: &ResolvedLocation) -> String {
    match resolved {
        ResolvedLocation::SameDocument { line } => {
            format!("**{}** defined on line {}", token.label(), line + 1)
        }
        ResolvedLocation::File { path, line } => {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match line {
                Some(line) => format!(
                    "Go to {} in `{}` (line {})",
                    token.kind.keyword(),
                    name,
                    line + 1
                ),
                None => format!("Go to {} in `{}`", token.kind.keyword(), name),
            }
        }
    }
}
