use super::{PropertyDef, PropertyKind};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

pub const PROTOCOL_VERSION: &str = "1.7";

pub fn get_properties() -> String {
    format!("<getProperties version=\"{}\"/>", PROTOCOL_VERSION)
}

pub fn new_switch_vector(device: &str, property: &str, switches: &[(&str, bool)]) -> String {
    let elements: String = switches
        .iter()
        .map(|(name, on)| {
            format!(
                "<oneSwitch name=\"{}\">{}</oneSwitch>",
                escape(*name),
                if *on { "On" } else { "Off" }
            )
        })
        .collect();
    format!(
        "<newSwitchVector device=\"{}\" name=\"{}\">{}</newSwitchVector>",
        escape(device),
        escape(property),
        elements
    )
}

pub fn new_number_vector(device: &str, property: &str, values: &[(&str, f64)]) -> String {
    let elements: String = values
        .iter()
        .map(|(name, value)| {
            format!(
                "<oneNumber name=\"{}\">{}</oneNumber>",
                escape(*name),
                value
            )
        })
        .collect();
    format!(
        "<newNumberVector device=\"{}\" name=\"{}\">{}</newNumberVector>",
        escape(device),
        escape(property),
        elements
    )
}

pub(super) fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).to_string())
        })
}

fn vector_kind(tag: &[u8]) -> Option<PropertyKind> {
    match tag {
        b"defSwitchVector" => Some(PropertyKind::Switch),
        b"defNumberVector" => Some(PropertyKind::Number),
        b"defTextVector" => Some(PropertyKind::Text),
        b"defLightVector" => Some(PropertyKind::Light),
        b"defBLOBVector" => Some(PropertyKind::Blob),
        _ => None,
    }
}

fn is_element_definition(tag: &[u8]) -> bool {
    matches!(
        tag,
        b"defSwitch" | b"defNumber" | b"defText" | b"defLight" | b"defBLOB"
    )
}

/// Assembles `def*Vector` messages out of the XML event stream. Everything
/// else the server sends is skipped.
#[derive(Debug, Default)]
pub struct DefinitionParser {
    current: Option<PropertyDef>,
    element: Option<String>,
}

impl DefinitionParser {
    /// Feeds one event. Returns a definition once its closing tag is seen.
    pub fn feed(&mut self, event: &Event) -> Option<PropertyDef> {
        match event {
            Event::Start(e) => {
                let tag = e.name();
                if let Some(kind) = vector_kind(tag.as_ref()) {
                    self.current = Self::open(e, kind);
                } else if is_element_definition(tag.as_ref()) {
                    if let (Some(def), Some(name)) =
                        (self.current.as_mut(), get_attribute(e, "name"))
                    {
                        def.elements.push((name.clone(), String::new()));
                        self.element = Some(name);
                    }
                }
                None
            }
            Event::Empty(e) => {
                let tag = e.name();
                if let Some(kind) = vector_kind(tag.as_ref()) {
                    return Self::open(e, kind);
                }
                if is_element_definition(tag.as_ref()) {
                    if let (Some(def), Some(name)) =
                        (self.current.as_mut(), get_attribute(e, "name"))
                    {
                        def.elements.push((name, String::new()));
                    }
                }
                None
            }
            Event::Text(t) => {
                if let (Some(def), Some(element)) = (self.current.as_mut(), self.element.as_ref()) {
                    let text = t.unescape().map(|v| v.trim().to_string()).unwrap_or_default();
                    if let Some(slot) = def.elements.iter_mut().find(|(n, _)| n == element) {
                        slot.1 = text;
                    }
                }
                None
            }
            Event::End(e) => {
                let tag = e.name();
                if vector_kind(tag.as_ref()).is_some() {
                    self.element = None;
                    return self.current.take();
                }
                if is_element_definition(tag.as_ref()) {
                    self.element = None;
                }
                None
            }
            _ => None,
        }
    }

    fn open(e: &BytesStart, kind: PropertyKind) -> Option<PropertyDef> {
        Some(PropertyDef {
            device: get_attribute(e, "device")?,
            name: get_attribute(e, "name")?,
            kind,
            perm: get_attribute(e, "perm").unwrap_or_else(|| "rw".to_string()),
            elements: Vec::new(),
        })
    }
}
