use crate::error::LoadError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Command,
    Movement,
    Operator,
    Direction,
    SpecialOverworld,
}

impl Category {
    pub fn section_key(self) -> &'static str {
        match self {
            Category::Command => "scrcmd",
            Category::Movement => "movements",
            Category::Operator => "comparisonOperators",
            Category::Direction => "overworldDirections",
            Category::SpecialOverworld => "specialOverworlds",
        }
    }

    pub fn from_section_key(key: &str) -> Option<Self> {
        SECTION_ORDER
            .iter()
            .copied()
            .find(|category| category.section_key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Command => "command",
            Category::Movement => "movement",
            Category::Operator => "operator",
            Category::Direction => "direction",
            Category::SpecialOverworld => "special overworld",
        }
    }
}

const SECTION_ORDER: [Category; 5] = [
    Category::Command,
    Category::Movement,
    Category::Operator,
    Category::Direction,
    Category::SpecialOverworld,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub id: String,
    pub name: String,
    pub parameters: Vec<String>,
    pub description: String,
    pub notes: String,
    pub category: Category,
}

impl CommandEntry {
    pub fn opcode_label(&self) -> String {
        let key = self.id.trim();
        if let Some(hex) = key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
            if let Ok(value) = u64::from_str_radix(hex, 16) {
                return format!("0x{:X}", value);
            }
            return key.to_uppercase();
        }
        match key.parse::<u64>() {
            Ok(value) => format!("0x{:X}", value),
            Err(_) => key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    FlatEntries,
    NameList,
    Sectioned,
    Keyed,
}

impl Schema {
    pub fn detect(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
                Some(Schema::NameList)
            }
            Value::Array(_) => Some(Schema::FlatEntries),
            Value::Object(map) if map.keys().any(|key| Category::from_section_key(key).is_some()) => {
                Some(Schema::Sectioned)
            }
            Value::Object(_) => Some(Schema::Keyed),
            _ => None,
        }
    }

    fn decode(self, value: &Value) -> Option<Decoded> {
        match self {
            Schema::FlatEntries => decode_flat_entries(value),
            Schema::NameList => decode_name_list(value),
            Schema::Sectioned => decode_sectioned(value),
            Schema::Keyed => decode_keyed(value),
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandCatalog {
    source: Option<PathBuf>,
    schema: Option<Schema>,
    entries: Vec<CommandEntry>,
    by_name: HashMap<String, usize>,
    by_opcode: HashMap<String, usize>,
    skipped: usize,
}

impl CommandCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(source: Option<PathBuf>, schema: Option<Schema>, entries: Vec<CommandEntry>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_opcode = HashMap::new();

        for category in SECTION_ORDER {
            for (idx, entry) in entries.iter().enumerate() {
                if entry.category != category {
                    continue;
                }
                by_name.entry(entry.name.to_lowercase()).or_insert(idx);
                by_opcode.entry(entry.id.clone()).or_insert(idx);
            }
        }

        Self {
            source,
            schema,
            entries,
            by_name,
            by_opcode,
            skipped: 0,
        }
    }

    pub fn parse(path: &Path, json: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(json).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let unrecognized = || LoadError::UnrecognizedSchema {
            path: path.to_path_buf(),
        };
        let schema = Schema::detect(&value).ok_or_else(unrecognized)?;
        let decoded = schema.decode(&value).ok_or_else(unrecognized)?;
        if decoded.entries.is_empty() && decoded.skipped > 0 {
            return Err(unrecognized());
        }

        let mut catalog = Self::from_entries(
            Some(path.to_path_buf()),
            Some(schema),
            decoded.entries,
        );
        catalog.skipped = decoded.skipped;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(path, &json)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn schema(&self) -> Option<Schema> {
        self.schema
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Case-insensitive exact match. Commands win over other categories
    /// sharing the same name.
    pub fn find_by_name(&self, name: &str) -> Option<&CommandEntry> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|idx| self.entries.get(*idx))
    }

    pub fn find_by_opcode(&self, id: &str) -> Option<&CommandEntry> {
        self.by_opcode
            .get(id)
            .and_then(|idx| self.entries.get(*idx))
    }

    pub fn all_entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn entries_in(&self, category: Category) -> impl Iterator<Item = &CommandEntry> + '_ {
        self.all_entries()
            .iter()
            .filter(move |entry| entry.category == category)
    }
}

#[derive(Debug, Default)]
struct Decoded {
    entries: Vec<CommandEntry>,
    skipped: usize,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    parameter_values: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    category: Option<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SectionValue {
    Name(String),
    Detailed(DetailedValue),
}

#[derive(Debug, Deserialize)]
struct DetailedValue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameter_values: Option<Value>,
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    notes: Option<String>,
}

fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

// `parameter_values` holds the labels. `parameters` may repeat them or hold
// byte sizes; it only counts when it is a list of strings.
fn parameter_labels(values: Option<&Value>, fallback: Option<&Value>) -> Vec<String> {
    string_list(values)
        .or_else(|| string_list(fallback))
        .unwrap_or_default()
}

fn decode_flat_entries(value: &Value) -> Option<Decoded> {
    let items = value.as_array()?;
    let mut decoded = Decoded::default();

    for (index, item) in items.iter().enumerate() {
        let Ok(raw) = FlatEntry::deserialize(item) else {
            decoded.skipped += 1;
            continue;
        };
        let id = raw
            .id
            .as_ref()
            .and_then(key_to_string)
            .unwrap_or_else(|| index.to_string());
        decoded.entries.push(CommandEntry {
            name: raw.name.unwrap_or_else(|| id.clone()),
            id,
            parameters: parameter_labels(raw.parameter_values.as_ref(), raw.parameters.as_ref()),
            description: raw.description.unwrap_or_default(),
            notes: raw.notes.unwrap_or_default(),
            category: raw.category.unwrap_or(Category::Command),
        });
    }

    Some(decoded)
}

fn decode_name_list(value: &Value) -> Option<Decoded> {
    let items = value.as_array()?;
    let mut decoded = Decoded::default();
    for (index, item) in items.iter().enumerate() {
        let Some(name) = item.as_str() else {
            decoded.skipped += 1;
            continue;
        };
        decoded.entries.push(CommandEntry {
            id: index.to_string(),
            name: name.to_string(),
            parameters: Vec::new(),
            description: String::new(),
            notes: String::new(),
            category: Category::Command,
        });
    }
    Some(decoded)
}

fn decode_section(map: &Map<String, Value>, category: Category, out: &mut Decoded) {
    for (key, raw) in map {
        let Ok(value) = SectionValue::deserialize(raw) else {
            out.skipped += 1;
            continue;
        };
        let entry = match value {
            SectionValue::Name(name) => CommandEntry {
                id: key.clone(),
                name,
                parameters: Vec::new(),
                description: String::new(),
                notes: String::new(),
                category,
            },
            SectionValue::Detailed(detail) => CommandEntry {
                id: key.clone(),
                parameters: parameter_labels(
                    detail.parameter_values.as_ref(),
                    detail.parameters.as_ref(),
                ),
                name: detail
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| key.clone()),
                description: detail.description.unwrap_or_default(),
                notes: detail.notes.unwrap_or_default(),
                category,
            },
        };
        out.entries.push(entry);
    }
}

fn decode_sectioned(value: &Value) -> Option<Decoded> {
    let root = value.as_object()?;
    let mut decoded = Decoded::default();

    for category in SECTION_ORDER {
        if let Some(section) = root.get(category.section_key()).and_then(Value::as_object) {
            decode_section(section, category, &mut decoded);
        }
    }

    Some(decoded)
}

fn decode_keyed(value: &Value) -> Option<Decoded> {
    let root = value.as_object()?;
    let mut decoded = Decoded::default();
    decode_section(root, Category::Command, &mut decoded);
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> CommandCatalog {
        CommandCatalog::parse(Path::new("db.json"), &value.to_string()).unwrap()
    }

    #[test]
    fn sectioned_names_round_trip_with_their_category() {
        let catalog = parse(json!({
            "scrcmd": {
                "0x0002": {
                    "name": "End",
                    "parameter_values": [],
                    "description": "Ends the script."
                }
            },
            "movements": { "0x000C": "WalkNorth" },
            "comparisonOperators": { "0": "LOWER" },
            "overworldDirections": { "1": { "name": "Down" } },
            "specialOverworlds": { "255": "Player" }
        }));

        assert_eq!(catalog.schema(), Some(Schema::Sectioned));
        let expected = [
            ("End", Category::Command),
            ("WalkNorth", Category::Movement),
            ("LOWER", Category::Operator),
            ("Down", Category::Direction),
            ("Player", Category::SpecialOverworld),
        ];
        for (name, category) in expected {
            let entry = catalog.find_by_name(name).expect(name);
            assert_eq!(entry.category, category, "{}", name);
        }
    }

    #[test]
    fn sectioned_entries_keep_parameters_in_order() {
        let catalog = parse(json!({
            "scrcmd": {
                "0x0016": {
                    "name": "Jump",
                    "parameter_values": ["Script", "Offset"],
                    "description": "Jumps."
                }
            }
        }));

        let entry = catalog.find_by_opcode("0x0016").unwrap();
        assert_eq!(entry.parameters, vec!["Script", "Offset"]);
        assert_eq!(entry.description, "Jumps.");
        assert_eq!(entry.opcode_label(), "0x16");
    }

    #[test]
    fn sectioned_entries_with_both_parameter_keys_are_read() {
        let catalog = parse(json!({
            "scrcmd": {
                "0x0028": {
                    "name": "SetVar",
                    "parameters": [2, 2],
                    "parameter_values": ["Variable", "Value"],
                    "description": "Sets a variable.",
                    "decomp_name": "ScrCmd_SetVar"
                },
                "0x0002": { "name": "End", "parameters": [], "parameter_values": [] }
            }
        }));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.skipped(), 0);
        let set_var = catalog.find_by_name("SetVar").unwrap();
        assert_eq!(set_var.parameters, vec!["Variable", "Value"]);
        assert_eq!(set_var.description, "Sets a variable.");
    }

    #[test]
    fn string_parameters_stand_in_for_missing_labels() {
        let catalog = parse(json!({
            "scrcmd": { "0x0016": { "name": "Jump", "parameters": ["Script"] } }
        }));
        assert_eq!(catalog.find_by_name("Jump").unwrap().parameters, vec!["Script"]);

        let catalog = parse(json!([
            { "id": 1, "name": "Nop", "parameters": [1], "parameter_values": ["Pad"] }
        ]));
        assert_eq!(catalog.find_by_name("Nop").unwrap().parameters, vec!["Pad"]);
    }

    #[test]
    fn unreadable_entries_are_skipped_and_counted() {
        let catalog = parse(json!({
            "scrcmd": {
                "0x0002": { "name": "End" },
                "0x0003": { "name": 3 }
            }
        }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.skipped(), 1);
    }

    #[test]
    fn section_with_no_readable_entry_is_a_load_error() {
        let json = json!({
            "scrcmd": {
                "0x0002": { "name": ["End"] },
                "0x0003": 42
            }
        });
        let err = CommandCatalog::parse(Path::new("db.json"), &json.to_string()).unwrap_err();
        assert!(matches!(err, LoadError::UnrecognizedSchema { .. }));
    }

    #[test]
    fn empty_section_is_an_empty_catalog() {
        let catalog = parse(json!({ "scrcmd": {} }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn flat_entries_default_missing_fields() {
        let catalog = parse(json!([
            { "id": 2, "name": "End", "parameters": [] },
            { "id": "0x5E", "parameters": ["Overworld", "Movement"], "category": "movement" },
            { "name": "CheckFlag", "notes": "legacy" }
        ]));

        assert_eq!(catalog.schema(), Some(Schema::FlatEntries));
        assert_eq!(catalog.len(), 3);

        let end = catalog.find_by_name("end").unwrap();
        assert_eq!(end.id, "2");
        assert_eq!(end.category, Category::Command);

        let unnamed = catalog.find_by_opcode("0x5E").unwrap();
        assert_eq!(unnamed.name, "0x5E");
        assert_eq!(unnamed.category, Category::Movement);

        let indexed = catalog.find_by_name("CheckFlag").unwrap();
        assert_eq!(indexed.id, "2");
        assert_eq!(indexed.notes, "legacy");
    }

    #[test]
    fn name_list_uses_array_index_as_id() {
        let catalog = parse(json!(["Nop", "Dummy", "End"]));
        assert_eq!(catalog.schema(), Some(Schema::NameList));
        assert_eq!(catalog.find_by_name("End").unwrap().id, "2");
    }

    #[test]
    fn keyed_map_is_read_as_commands() {
        let catalog = parse(json!({
            "0x0002": { "name": "End", "parameter_values": [] },
            "0x0003": "ReturnScript"
        }));
        assert_eq!(catalog.schema(), Some(Schema::Keyed));
        assert_eq!(
            catalog.find_by_name("returnscript").unwrap().category,
            Category::Command
        );
    }

    #[test]
    fn name_lookup_is_case_insensitive_and_prefers_commands() {
        let catalog = parse(json!({
            "movements": { "0x0001": "Face" },
            "scrcmd": { "0x0040": { "name": "Face" } }
        }));
        let entry = catalog.find_by_name("FACE").unwrap();
        assert_eq!(entry.category, Category::Command);
        assert_eq!(entry.id, "0x0040");
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        let err = CommandCatalog::parse(Path::new("broken.json"), "{ not json").unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert_eq!(err.path(), &PathBuf::from("broken.json"));
    }

    #[test]
    fn scalar_json_is_an_unrecognized_layout() {
        let err = CommandCatalog::parse(Path::new("n.json"), "42").unwrap_err();
        assert!(matches!(err, LoadError::UnrecognizedSchema { .. }));
    }

    #[test]
    fn opcode_label_keeps_symbolic_keys() {
        let entry = CommandEntry {
            id: "EQUAL".into(),
            name: "EQUAL".into(),
            parameters: vec![],
            description: String::new(),
            notes: String::new(),
            category: Category::Operator,
        };
        assert_eq!(entry.opcode_label(), "EQUAL");
    }
}
