//! XML-RPC envelope codec for the game backends.
//!
//! Requests are a fixed `<root><game/><request/></root>` document:
//!
//! ```xml
//! <root>
//!   <game>
//!     <name>ManiaPlanet</name>
//!     <version>3.3.0</version>
//!     <build>2016-11-07_16_15</build>
//!     <title>TMTurbo@nadeolabs</title>   <!-- leaderboard requests only -->
//!   </game>
//!   <request>
//!     <name>GetLeaderBoardSummary</name>
//!     <params><t>Map</t>...</params>     <!-- omitted without params -->
//!   </request>
//! </root>
//! ```
//!
//! Responses are `<r><r><c>...</c></r></r>` on success and
//! `<r><r><e><m>message</m></e></r></r>` on a protocol-level error. The
//! backends are strict about the request shape; whitespace does not matter.

use roxmltree::{Document, Node};
use thiserror::Error;

const GAME_NAME: &str = "ManiaPlanet";
const GAME_VERSION: &str = "3.3.0";
const GAME_BUILD: &str = "2016-11-07_16_15";
pub const GAME_TITLE: &str = "TMTurbo@nadeolabs";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The document parsed but carries an `<e>` node
    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Malformed(String),
}

/// A request envelope ready to be rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlRequest {
    name: &'static str,
    title: Option<&'static str>,
    params: Vec<(&'static str, String)>,
}

impl XmlRequest {
    /// Discovery handshake returning the relay ("master server") address.
    pub fn get_waiting_params() -> Self {
        XmlRequest {
            name: "GetWaitingParams",
            title: None,
            params: Vec::new(),
        }
    }

    pub fn get_leagues() -> Self {
        XmlRequest {
            name: "GetLeagues",
            title: None,
            params: Vec::new(),
        }
    }

    pub fn get_leaderboard_summary(map_uid: &str, zone: &str) -> Self {
        XmlRequest {
            name: "GetLeaderBoardSummary",
            title: Some(GAME_TITLE),
            params: vec![
                ("t", "Map".to_string()),
                ("c", GAME_TITLE.to_string()),
                ("m", map_uid.to_string()),
                ("s", "0".to_string()),
                ("z", zone.to_string()),
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256);
        xml.push_str("<root><game>");
        push_node(&mut xml, "name", GAME_NAME);
        push_node(&mut xml, "version", GAME_VERSION);
        push_node(&mut xml, "build", GAME_BUILD);
        if let Some(title) = self.title {
            push_node(&mut xml, "title", title);
        }
        xml.push_str("</game><request>");
        push_node(&mut xml, "name", self.name);
        if !self.params.is_empty() {
            xml.push_str("<params>");
            for (key, value) in &self.params {
                push_node(&mut xml, key, value);
            }
            xml.push_str("</params>");
        }
        xml.push_str("</request></root>");
        xml
    }
}

fn push_node(xml: &mut String, name: &str, value: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    for c in value.chars() {
        match c {
            '&' => xml.push_str("&amp;"),
            '<' => xml.push_str("&lt;"),
            '>' => xml.push_str("&gt;"),
            '"' => xml.push_str("&quot;"),
            '\'' => xml.push_str("&apos;"),
            c => xml.push(c),
        }
    }
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

/// Owned copy of a response element, detached from the parsed document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_node(node: Node<'_, '_>) -> Self {
        let text: String = node
            .children()
            .filter(|child| child.is_text())
            .filter_map(|child| child.text())
            .collect();

        XmlElement {
            name: node.tag_name().name().to_string(),
            text: text.trim().to_string(),
            children: node
                .children()
                .filter(|child| child.is_element())
                .map(XmlElement::from_node)
                .collect(),
        }
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }
}

/// Parses a response envelope and returns its `<c>` content element.
pub fn parse_envelope(body: &str) -> Result<XmlElement, EnvelopeError> {
    let document =
        Document::parse(body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

    let root = document.root_element();
    if !root.has_tag_name("r") {
        return Err(EnvelopeError::Malformed(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    let response = element_child(root, "r")
        .ok_or_else(|| EnvelopeError::Malformed("missing response node".into()))?;

    if let Some(content) = element_child(response, "c") {
        return Ok(XmlElement::from_node(content));
    }

    if let Some(error) = element_child(response, "e") {
        let message = element_child(error, "m")
            .and_then(|m| m.text())
            .unwrap_or_default()
            .trim()
            .to_string();
        return Err(EnvelopeError::Protocol(message));
    }

    Err(EnvelopeError::Malformed(
        "response has neither content nor error node".into(),
    ))
}

fn element_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.has_tag_name(name))
}
