//! Layout definitions
//!
//! Author-time, static descriptions of a form: pages, component definitions
//! and layout settings. These deserialize straight from the layout store's
//! JSON and are never mutated by the engine; every pass reads them fresh.
//!
//! Component kinds are a closed set. Anything kind-specific (which bindings
//! exist, whether the kind is a container, which validation stages apply)
//! lives in a static capability table keyed by kind, not in per-kind code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::validation::Severity;

/* ===================== JSON Kinds ===================== */

/// The JSON-ish type set components declare for their accepted bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl JsonKind {
    /// Classify a data-model value. Null has no kind.
    pub fn of(value: &JsonValue) -> Option<JsonKind> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(JsonKind::Boolean),
            JsonValue::Number(_) => Some(JsonKind::Number),
            JsonValue::String(_) => Some(JsonKind::String),
            JsonValue::Array(_) => Some(JsonKind::Array),
            JsonValue::Object(_) => Some(JsonKind::Object),
        }
    }
}

impl std::fmt::Display for JsonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JsonKind::String => "string",
            JsonKind::Number => "number",
            JsonKind::Boolean => "boolean",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/* ===================== Component Kinds ===================== */

/// The closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    Input,
    TextArea,
    Checkboxes,
    RadioButtons,
    Dropdown,
    Datepicker,
    Header,
    Paragraph,
    Group,
    Grid,
}

/// One binding a component kind understands.
#[derive(Debug, Clone, Copy)]
pub struct BindingSpec {
    pub name: &'static str,
    pub required: bool,
    pub accepts: &'static [JsonKind],
}

/// Kind-specific behavior flags, looked up instead of dispatched.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Bindings this kind declares, in order.
    pub bindings: &'static [BindingSpec],
    /// Whether the kind owns child components.
    pub is_container: bool,
    /// Whether the kind may repeat per data-model row.
    pub supports_repeat: bool,
    /// Whether the binding validation stage applies.
    pub validates_data_binding: bool,
    /// Whether instances count as component-bearing cells for row collapse.
    pub renders_in_table: bool,
}

const SCALARISH: &[JsonKind] = &[JsonKind::String, JsonKind::Number, JsonKind::Boolean];
const STRING_ONLY: &[JsonKind] = &[JsonKind::String];
const STRING_OR_NUMBER: &[JsonKind] = &[JsonKind::String, JsonKind::Number];
const STRING_OR_ARRAY: &[JsonKind] = &[JsonKind::String, JsonKind::Array];
const ARRAY_ONLY: &[JsonKind] = &[JsonKind::Array];

const SIMPLE: BindingSpec = BindingSpec {
    name: "simpleBinding",
    required: true,
    accepts: SCALARISH,
};

static INPUT_CAPS: Capabilities = Capabilities {
    bindings: &[SIMPLE],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static TEXT_AREA_CAPS: Capabilities = Capabilities {
    bindings: &[BindingSpec {
        name: "simpleBinding",
        required: true,
        accepts: STRING_ONLY,
    }],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static CHECKBOXES_CAPS: Capabilities = Capabilities {
    bindings: &[BindingSpec {
        name: "simpleBinding",
        required: true,
        accepts: STRING_OR_ARRAY,
    }],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static RADIO_BUTTONS_CAPS: Capabilities = Capabilities {
    bindings: &[SIMPLE],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static DROPDOWN_CAPS: Capabilities = Capabilities {
    bindings: &[BindingSpec {
        name: "simpleBinding",
        required: true,
        accepts: STRING_OR_NUMBER,
    }],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static DATEPICKER_CAPS: Capabilities = Capabilities {
    bindings: &[BindingSpec {
        name: "simpleBinding",
        required: true,
        accepts: STRING_ONLY,
    }],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: true,
    renders_in_table: true,
};

static PRESENTATION_CAPS: Capabilities = Capabilities {
    bindings: &[],
    is_container: false,
    supports_repeat: false,
    validates_data_binding: false,
    renders_in_table: false,
};

static GROUP_CAPS: Capabilities = Capabilities {
    bindings: &[BindingSpec {
        name: "group",
        required: false,
        accepts: ARRAY_ONLY,
    }],
    is_container: true,
    supports_repeat: true,
    validates_data_binding: true,
    renders_in_table: false,
};

static GRID_CAPS: Capabilities = Capabilities {
    bindings: &[],
    is_container: true,
    supports_repeat: false,
    validates_data_binding: false,
    renders_in_table: false,
};

/// Capability lookup table for every component kind.
pub fn capabilities(kind: ComponentKind) -> &'static Capabilities {
    match kind {
        ComponentKind::Input => &INPUT_CAPS,
        ComponentKind::TextArea => &TEXT_AREA_CAPS,
        ComponentKind::Checkboxes => &CHECKBOXES_CAPS,
        ComponentKind::RadioButtons => &RADIO_BUTTONS_CAPS,
        ComponentKind::Dropdown => &DROPDOWN_CAPS,
        ComponentKind::Datepicker => &DATEPICKER_CAPS,
        ComponentKind::Header | ComponentKind::Paragraph => &PRESENTATION_CAPS,
        ComponentKind::Group => &GROUP_CAPS,
        ComponentKind::Grid => &GRID_CAPS,
    }
}

impl ComponentKind {
    pub fn capabilities(self) -> &'static Capabilities {
        capabilities(self)
    }

    /// Look up the spec for one binding name on this kind.
    pub fn binding_spec(self, name: &str) -> Option<&'static BindingSpec> {
        self.capabilities().bindings.iter().find(|b| b.name == name)
    }
}

/* ===================== Component Definition ===================== */

/// A declared binding: either a bare field path into the default data type,
/// or an explicit (data type, field) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindingDecl {
    Path(String),
    #[serde(rename_all = "camelCase")]
    Reference { data_type: String, field: String },
}

impl BindingDecl {
    pub fn field(&self) -> &str {
        match self {
            BindingDecl::Path(field) => field,
            BindingDecl::Reference { field, .. } => field,
        }
    }

    pub fn data_type(&self) -> Option<&str> {
        match self {
            BindingDecl::Path(_) => None,
            BindingDecl::Reference { data_type, .. } => Some(data_type),
        }
    }
}

/// An author-declared custom validation rule on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomValidation {
    /// Expression; the rule fires when it evaluates to true.
    pub condition: JsonValue,
    pub severity: Severity,
    /// Message key, resolved by a presentation collaborator.
    pub message: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// One cell in a grid row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridCellDef {
    Component { component: String },
    Text { text: String },
    Empty {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRowDef {
    pub cells: Vec<GridCellDef>,
}

/// The static, author-time description of one form element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    /// Unique within the layout page (and within its repeating scope).
    pub id: String,

    #[serde(rename = "type")]
    pub kind: ComponentKind,

    /// Logical binding name -> data model location.
    #[serde(default)]
    pub data_model_bindings: BTreeMap<String, BindingDecl>,

    /// Label/help/title text keys.
    #[serde(default)]
    pub text_resource_bindings: BTreeMap<String, String>,

    /// Literal boolean or expression. Absent means visible.
    #[serde(default)]
    pub hidden: JsonValue,

    /// Child component ids (container kinds only).
    #[serde(default)]
    pub children: Vec<String>,

    /// For groups: the maximum repeat count. A group repeats when this is
    /// greater than 1 and a `group` binding is declared.
    #[serde(default)]
    pub max_count: Option<u32>,

    /// Grid rows (grid kind only).
    #[serde(default)]
    pub rows: Vec<GridRowDef>,

    #[serde(default)]
    pub validations: Vec<CustomValidation>,
}

impl ComponentDef {
    /// Whether this definition describes a repeating group.
    pub fn is_repeating(&self) -> bool {
        self.kind.capabilities().supports_repeat
            && self.max_count.map_or(false, |n| n > 1)
            && self.data_model_bindings.contains_key("group")
    }
}

/* ===================== Pages and Settings ===================== */

/// One layout page: an ordered, flat list of component definitions plus an
/// optional page-level hidden expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPageDef {
    pub components: Vec<ComponentDef>,

    #[serde(default)]
    pub hidden: JsonValue,
}

/// All pages of a layout set, keyed by page name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutSet {
    pub pages: BTreeMap<String, LayoutPageDef>,
}

/// Global layout settings: page order and UI behavior flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutSettings {
    /// Page names in display order. Pages absent from this list are not
    /// generated.
    pub page_order: Vec<String>,

    /// Pages excluded from automatic document generation.
    pub exclude_from_pdf: Vec<String>,

    /// Autosave cadence in milliseconds; None disables autosave.
    pub autosave_ms: Option<u64>,

    pub show_language_selector: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            page_order: Vec::new(),
            exclude_from_pdf: Vec::new(),
            autosave_ms: Some(1000),
            show_language_selector: false,
        }
    }
}

impl LayoutSettings {
    /// Pages to generate, in order. An empty `page_order` means every page
    /// of the set, in name order.
    pub fn ordered_pages<'a>(&'a self, layouts: &'a LayoutSet) -> Vec<&'a str> {
        if self.page_order.is_empty() {
            layouts.pages.keys().map(String::as_str).collect()
        } else {
            self.page_order
                .iter()
                .filter(|name| layouts.pages.contains_key(*name))
                .map(String::as_str)
                .collect()
        }
    }
}
