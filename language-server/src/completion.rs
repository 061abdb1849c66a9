use crate::catalog::{Category, CommandCatalog, CommandEntry};
use crate::config::CompletionStyle;
use tower_lsp::lsp_types::{
    Command, CompletionItem, CompletionItemKind, Documentation, InsertTextFormat,
    ParameterInformation, ParameterLabel, SignatureHelp, SignatureInformation,
};

const PARAMETER_HINTS: &str = "editor.action.triggerParameterHints";

pub(crate) fn in_first_token(line: &str, column: usize) -> bool {
    let Some(before) = line.get(..column) else {
        return false;
    };
    let typed = before.trim_start();
    if typed.chars().any(char::is_whitespace) {
        return false;
    }
    let first_word = line.split_whitespace().next().unwrap_or_default();
    typed.len() <= first_word.len()
}

pub(crate) fn category_for(language_id: Option<&str>, path_extension: Option<&str>) -> Category {
    let is_action = language_id == Some("pokemon_ds_action") || path_extension == Some("action");
    if is_action {
        Category::Movement
    } else {
        Category::Command
    }
}

fn escape_snippet(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn insert_text(entry: &CommandEntry, style: CompletionStyle) -> String {
    match style {
        CompletionStyle::NameOnly => format!("{} ", entry.name),
        CompletionStyle::Placeholders => {
            let mut parts = vec![escape_snippet(&entry.name)];
            for (idx, parameter) in entry.parameters.iter().enumerate() {
                parts.push(format!("${{{}:{}}}", idx + 1, escape_snippet(parameter)));
            }
            parts.join(" ")
        }
    }
}

pub(crate) fn completion_items(
    catalog: &CommandCatalog,
    category: Category,
    style: CompletionStyle,
) -> Vec<CompletionItem> {
    catalog
        .entries_in(category)
        .map(|entry| {
            let detail = if entry.parameters.is_empty() {
                entry.opcode_label()
            } else {
                format!("{} {}", entry.opcode_label(), entry.parameters.join(" "))
            };
            CompletionItem {
                label: entry.name.clone(),
                kind: Some(CompletionItemKind::FUNCTION),
                detail: Some(detail),
                documentation: (!entry.description.is_empty())
                    .then(|| Documentation::String(entry.description.clone())),
                insert_text: Some(insert_text(entry, style)),
                insert_text_format: Some(match style {
                    CompletionStyle::NameOnly => InsertTextFormat::PLAIN_TEXT,
                    CompletionStyle::Placeholders => InsertTextFormat::SNIPPET,
                }),
                command: Some(Command {
                    title: "Trigger Parameter Hints".to_string(),
                    command: PARAMETER_HINTS.to_string(),
                    arguments: None,
                }),
                ..Default::default()
            }
        })
        .collect()
}

pub(crate) fn signature_help(
    catalog: &CommandCatalog,
    line: &str,
    column: usize,
) -> Option<SignatureHelp> {
    let command = line.split_whitespace().next()?;
    let entry = catalog.find_by_name(command)?;

    let label = format!("{} {}", entry.name, entry.parameters.join(" "))
        .trim()
        .to_string();
    let parameters: Vec<ParameterInformation> = entry
        .parameters
        .iter()
        .map(|parameter| ParameterInformation {
            label: ParameterLabel::Simple(parameter.clone()),
            documentation: None,
        })
        .collect();

    let before = line.get(..column).unwrap_or(line);
    let typed_tokens = before.split_whitespace().count();
    let active = typed_tokens
        .saturating_sub(1)
        .min(entry.parameters.len().saturating_sub(1)) as u32;

    Some(SignatureHelp {
        signatures: vec![SignatureInformation {
            label,
            documentation: (!entry.description.is_empty())
                .then(|| Documentation::String(entry.description.clone())),
            parameters: Some(parameters),
            active_parameter: None,
        }],
        active_signature: Some(0),
        active_parameter: Some(active),
    })
}
