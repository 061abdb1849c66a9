use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Function|Script|Action)#(\d+)\b").expect("reference pattern")
});

static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"0x[0-9A-Fa-f]+|\b\d+\b|[A-Za-z_][A-Za-z0-9_#]*").expect("word pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Script,
    Function,
    Action,
}

impl RefKind {
    pub const ALL: [RefKind; 3] = [RefKind::Script, RefKind::Function, RefKind::Action];

    pub fn keyword(self) -> &'static str {
        match self {
            RefKind::Script => "Script",
            RefKind::Function => "Function",
            RefKind::Action => "Action",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        RefKind::ALL
            .into_iter()
            .find(|kind| kind.keyword() == keyword)
    }

    pub fn from_keyword_ignore_case(keyword: &str) -> Option<Self> {
        RefKind::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(keyword))
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            RefKind::Script => "script",
            RefKind::Function => "func",
            RefKind::Action => "action",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            RefKind::Script | RefKind::Function => "script",
            RefKind::Action => "action",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    pub kind: RefKind,
    pub id: u32,
    pub span: Range<usize>,
}

impl ReferenceToken {
    pub fn label(&self) -> String {
        format!("{}#{}", self.kind.keyword(), self.id)
    }
}

pub fn scan(text: &str) -> impl Iterator<Item = ReferenceToken> + '_ {
    REFERENCE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let kind = RefKind::from_keyword(caps.get(1)?.as_str())?;
        let id = caps.get(2)?.as_str().parse().ok()?;
        Some(ReferenceToken {
            kind,
            id,
            span: whole.range(),
        })
    })
}

/// The reference token covering `column` (a byte column; touching either end
/// counts, like an editor word range).
pub fn token_at(line: &str, column: usize) -> Option<ReferenceToken> {
    scan(line).find(|token| token.span.start <= column && column <= token.span.end)
}

pub fn word_at(line: &str, column: usize) -> Option<(&str, Range<usize>)> {
    WORD.find_iter(line)
        .find(|m| m.start() <= column && column <= m.end())
        .map(|m| (m.as_str(), m.range()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberLiteral {
    Hex(u64),
    Decimal(u64),
}

impl NumberLiteral {
    pub fn classify(word: &str) -> Option<Self> {
        if let Some(digits) = word.strip_prefix("0x") {
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            return u64::from_str_radix(digits, 16).ok().map(NumberLiteral::Hex);
        }
        if word.is_empty() || !word.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        word.parse().ok().map(NumberLiteral::Decimal)
    }

    pub fn describe(self, original: &str) -> String {
        match self {
            NumberLiteral::Hex(v) => format!("Decimal for {}: {}", original, v),
            NumberLiteral::Decimal(v) => format!("Hex for {}: 0x{:X}", original, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_recovers_kind_id_and_exact_span() {
        let text = "    CallFunction Function#3\n    Jump Script#12 ; Action#0";
        let tokens: Vec<_> = scan(text).collect();
        assert_eq!(tokens.len(), 3);

        assert_eq!(tokens[0].kind, RefKind::Function);
        assert_eq!(tokens[0].id, 3);
        assert_eq!(&text[tokens[0].span.clone()], "Function#3");

        assert_eq!(tokens[1].kind, RefKind::Script);
        assert_eq!(tokens[1].id, 12);
        assert_eq!(&text[tokens[1].span.clone()], "Script#12");

        assert_eq!(tokens[2].kind, RefKind::Action);
        assert_eq!(tokens[2].id, 0);
    }

    #[test]
    fn lowercase_keywords_are_not_references() {
        assert_eq!(scan("Jump function#3 SCRIPT#4").count(), 0);
    }

    #[test]
    fn keyword_must_start_at_word_boundary() {
        assert_eq!(scan("MyScript#3 Script#3x").count(), 0);
        assert_eq!(scan("(Script#3)").count(), 1);
    }

    #[test]
    fn scan_is_restartable() {
        let text = "Script#1 Script#2";
        let first: Vec<_> = scan(text).collect();
        let second: Vec<_> = scan(text).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn token_at_accepts_both_edges() {
        let line = "Jump Function#7";
        assert!(token_at(line, 4).is_none());
        assert_eq!(token_at(line, 5).unwrap().id, 7);
        assert_eq!(token_at(line, line.len()).unwrap().kind, RefKind::Function);
    }

    #[test]
    fn word_at_prefers_hex_literal() {
        let line = "SetVar 0x4000 31";
        assert_eq!(word_at(line, 9).unwrap().0, "0x4000");
        assert_eq!(word_at(line, 15).unwrap().0, "31");
        assert_eq!(word_at(line, 2).unwrap().0, "SetVar");
    }

    #[test]
    fn number_hover_converts_bases() {
        let hex = NumberLiteral::classify("0x1F").unwrap();
        assert_eq!(hex.describe("0x1F"), "Decimal for 0x1F: 31");

        let dec = NumberLiteral::classify("31").unwrap();
        assert_eq!(dec.describe("31"), "Hex for 31: 0x1F");

        assert!(NumberLiteral::classify("0x").is_none());
        assert!(NumberLiteral::classify("Script#3").is_none());
    }

    #[test]
    fn sibling_file_parts_follow_naming_convention() {
        assert_eq!(RefKind::Function.file_stem(), "func");
        assert_eq!(RefKind::Function.file_extension(), "script");
        assert_eq!(RefKind::Action.file_extension(), "action");
        assert_eq!(RefKind::from_keyword_ignore_case("SCRIPT"), Some(RefKind::Script));
        assert_eq!(RefKind::from_keyword("script"), None);
    }
}
