//! Binary script format - saving and loading director graphs
//!
//! Layout: header (version, timestamps, script type, libraries, director
//! properties), then a pre-order traversal of graphs (per graph: properties
//! and three counted node sections), then flat connection tables resolved
//! in a second pass once every node exists. All integers are little-endian;
//! strings are an i32 length prefix followed by UTF-8 bytes.
//!
//! Missing node types and libraries are collected, not fatal: the script
//! loads best-effort without the affected nodes and links. Structural
//! damage (short reads, bad UTF-8, a version from the future) aborts the
//! load.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::director::Director;
use crate::graph::DirectorGraph;
use crate::ids::{GraphId, NodeId};

/// Current format version. Files reporting a newer version are refused.
pub const BINARY_SCRIPT_VERSION: f32 = 1.0;

/// Refuse absurd string lengths before allocating
const MAX_STRING_LEN: i32 = 16 * 1024 * 1024;

/// Failure while reading or writing a binary script
#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("script version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: f32, supported: f32 },
    #[error("expected script type {expected:?}, found {found:?}")]
    ScriptTypeMismatch { expected: String, found: String },
    #[error("malformed script data: {0}")]
    Malformed(String),
}

/// One pending connection, recorded while nodes are still being created
struct LinkData {
    from: Uuid,
    to: Uuid,
    output_name: String,
    input_name: String,
    is_value: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Primitive readers / writers
// ─────────────────────────────────────────────────────────────────────────────

fn read_f32(r: &mut impl Read) -> Result<f32, BinaryError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_i32(r: &mut impl Read) -> Result<i32, BinaryError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_count(r: &mut impl Read, what: &str) -> Result<usize, BinaryError> {
    let count = read_i32(r)?;
    if count < 0 {
        return Err(BinaryError::Malformed(format!("negative {what} count")));
    }
    Ok(count as usize)
}

fn read_bool(r: &mut impl Read) -> Result<bool, BinaryError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

fn read_string(r: &mut impl Read) -> Result<String, BinaryError> {
    let len = read_i32(r)?;
    if len < 0 || len > MAX_STRING_LEN {
        return Err(BinaryError::Malformed(format!("bad string length {len}")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| BinaryError::Malformed("invalid utf-8".to_string()))
}

fn read_uuid(r: &mut impl Read) -> Result<Uuid, BinaryError> {
    let text = read_string(r)?;
    text.parse()
        .map_err(|_| BinaryError::Malformed(format!("bad uuid {text:?}")))
}

fn write_f32(w: &mut impl Write, value: f32) -> Result<(), BinaryError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i32(w: &mut impl Write, value: i32) -> Result<(), BinaryError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_bool(w: &mut impl Write, value: bool) -> Result<(), BinaryError> {
    w.write_all(&[u8::from(value)])?;
    Ok(())
}

fn write_string(w: &mut impl Write, value: &str) -> Result<(), BinaryError> {
    write_i32(w, value.len() as i32)?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary Parser
// ─────────────────────────────────────────────────────────────────────────────

/// Loads a binary script into a fresh director
#[derive(Default)]
pub struct BinaryParser {
    script_type: String,
    missing_node_types: BTreeSet<String>,
    missing_libraries: Vec<String>,
    links: Vec<LinkData>,
}

impl BinaryParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a script file into the given (empty) director
    pub fn parse(&mut self, director: &mut Director, path: &Path) -> Result<(), BinaryError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.parse_from(director, &mut reader)
    }

    /// Parse a script from any byte stream
    pub fn parse_from(
        &mut self,
        director: &mut Director,
        r: &mut impl Read,
    ) -> Result<(), BinaryError> {
        director.loading = true;
        let result = self.parse_inner(director, r);
        director.loading = false;
        result
    }

    /// Read only the header of a script file and report its script type
    pub fn parse_script_type(path: &Path) -> Result<String, BinaryError> {
        let file = File::open(path)?;
        let mut r = BufReader::new(file);

        let version = read_f32(&mut r)?;
        if version > BINARY_SCRIPT_VERSION {
            return Err(BinaryError::UnsupportedVersion {
                found: version,
                supported: BINARY_SCRIPT_VERSION,
            });
        }
        let _created = read_string(&mut r)?;
        let _saved = read_string(&mut r)?;
        read_string(&mut r)
    }

    /// Node types named by the file but absent from the registry, as full
    /// "Category.Name" strings
    pub fn missing_node_types(&self) -> &BTreeSet<String> {
        &self.missing_node_types
    }

    /// Libraries named by the file but absent from the registry
    pub fn missing_libraries(&self) -> &[String] {
        &self.missing_libraries
    }

    /// Script type read from the last parsed header
    pub fn script_type(&self) -> &str {
        &self.script_type
    }

    fn parse_inner(
        &mut self,
        director: &mut Director,
        r: &mut impl Read,
    ) -> Result<(), BinaryError> {
        // Header.
        let version = read_f32(r)?;
        if version > BINARY_SCRIPT_VERSION {
            return Err(BinaryError::UnsupportedVersion {
                found: version,
                supported: BINARY_SCRIPT_VERSION,
            });
        }

        let created = read_string(r)?;
        let _saved = read_string(r)?;
        self.script_type = read_string(r)?;
        if self.script_type != director.script_type() {
            return Err(BinaryError::ScriptTypeMismatch {
                expected: director.script_type().to_string(),
                found: self.script_type.clone(),
            });
        }
        director.created = Some(created);

        let library_count = read_count(r, "library")?;
        for _ in 0..library_count {
            let library = read_string(r)?;
            if !library.is_empty() && !director.add_library(&library) {
                warn!(library = %library, "script requires an unregistered node library");
                self.missing_libraries.push(library);
            }
        }

        Self::parse_property_container(r, Some(director.properties_mut()))?;

        // Graph tree, then the flat connection tables.
        self.parse_graph(director, None, r)?;
        self.parse_link_connections(r)?;
        self.link_nodes(director);

        Ok(())
    }

    fn parse_graph(
        &mut self,
        director: &mut Director,
        parent: Option<GraphId>,
        r: &mut impl Read,
    ) -> Result<(), BinaryError> {
        let _index_hint = read_i32(r)?;
        let uuid = read_uuid(r)?;

        let graph = match parent {
            None => director.root_graph(),
            Some(p) => director
                .create_graph(p)
                .ok_or_else(|| BinaryError::Malformed("orphan subgraph".to_string()))?,
        };
        director.set_graph_uuid(graph, uuid);

        Self::parse_property_container(r, director.graph_mut(graph).map(DirectorGraph::properties_mut))?;

        // Event, action, and value node sections.
        for section in ["event node", "action node", "value node"] {
            let count = read_count(r, section)?;
            for _ in 0..count {
                self.parse_node(director, graph, r)?;
            }
        }

        let subgraph_count = read_count(r, "subgraph")?;
        for _ in 0..subgraph_count {
            self.parse_graph(director, Some(graph), r)?;
        }

        Ok(())
    }

    fn parse_node(
        &mut self,
        director: &mut Director,
        graph: GraphId,
        r: &mut impl Read,
    ) -> Result<(), BinaryError> {
        let type_name = read_string(r)?;
        let category = read_string(r)?;
        let _index_hint = read_i32(r)?;
        let uuid = read_uuid(r)?;

        let node = match director.create_node(&category, &type_name, graph) {
            Ok(id) => {
                director.set_node_uuid(id, uuid);
                Some(id)
            }
            Err(_) => {
                let full_name = format!("{category}.{type_name}");
                warn!(node_type = %full_name, "script references an unregistered node type");
                self.missing_node_types.insert(full_name);
                None
            }
        };

        // The node's records are consumed either way so the stream stays
        // aligned past a missing type.
        Self::parse_property_container(
            r,
            node.and_then(|id| director.node_mut(id)).map(|n| n.properties_mut()),
        )?;
        if let Some(n) = node.and_then(|id| director.node_mut(id)) {
            n.refresh_enabled();
        }

        // Hidden input links.
        let input_count = read_count(r, "input link")?;
        for _ in 0..input_count {
            let name = read_string(r)?;
            if let Some(link) = node
                .and_then(|id| director.node_mut(id))
                .and_then(|n| n.input_link_mut(&name))
            {
                link.visible = false;
            }
        }

        // Output link flags.
        let output_count = read_count(r, "output link")?;
        for _ in 0..output_count {
            let name = read_string(r)?;
            let visible = read_bool(r)?;
            if let Some(link) = node
                .and_then(|id| director.node_mut(id))
                .and_then(|n| n.output_link_mut(&name))
            {
                link.visible = visible;
            }
        }

        // Value link flags.
        let value_count = read_count(r, "value link")?;
        for _ in 0..value_count {
            let name = read_string(r)?;
            let visible = read_bool(r)?;
            let exposed = read_bool(r)?;
            if let Some(link) = node
                .and_then(|id| director.node_mut(id))
                .and_then(|n| n.value_link_mut(&name))
            {
                link.visible = visible;
                link.exposed = exposed;
            }
        }

        Ok(())
    }

    fn parse_link_connections(&mut self, r: &mut impl Read) -> Result<(), BinaryError> {
        let chain_count = read_count(r, "chain link")?;
        for _ in 0..chain_count {
            let _from_hint = read_i32(r)?;
            let from = read_uuid(r)?;
            let _to_hint = read_i32(r)?;
            let to = read_uuid(r)?;
            let output_name = read_string(r)?;
            let input_name = read_string(r)?;
            self.links.push(LinkData {
                from,
                to,
                output_name,
                input_name,
                is_value: false,
            });
        }

        let value_count = read_count(r, "value link connection")?;
        for _ in 0..value_count {
            let _from_hint = read_i32(r)?;
            let from = read_uuid(r)?;
            let _to_hint = read_i32(r)?;
            let to = read_uuid(r)?;
            let output_name = read_string(r)?;
            self.links.push(LinkData {
                from,
                to,
                output_name,
                input_name: String::new(),
                is_value: true,
            });
        }

        Ok(())
    }

    /// Second pass: resolve uuids to live nodes and make the connections.
    /// Links naming nodes that were not created (missing types) are dropped.
    /// Failed value connections are retried while the remaining passes make
    /// progress; some depend on other links existing first.
    fn link_nodes(&mut self, director: &mut Director) {
        let mut remaining = std::mem::take(&mut self.links);
        loop {
            let before = remaining.len();
            let mut failed = Vec::new();
            for data in remaining {
                let (Some(from), Some(to)) = (
                    director.find_node_by_uuid(data.from),
                    director.find_node_by_uuid(data.to),
                ) else {
                    continue;
                };
                if data.is_value {
                    if !director.connect_value(from, &data.output_name, to) {
                        failed.push(data);
                    }
                } else if !director.connect_chain(from, &data.output_name, to, &data.input_name) {
                    debug!(
                        output = %data.output_name,
                        input = %data.input_name,
                        "chain link could not be restored"
                    );
                }
            }
            if failed.is_empty() || failed.len() == before {
                for data in failed {
                    debug!(link = %data.output_name, "value link could not be restored");
                }
                break;
            }
            remaining = failed;
        }
    }

    fn parse_property_container(
        r: &mut impl Read,
        container: Option<&mut director_types::PropertyContainer>,
    ) -> Result<(), BinaryError> {
        let count = read_count(r, "property")?;
        match container {
            Some(container) => {
                for _ in 0..count {
                    let name = read_string(r)?;
                    let value = read_string(r)?;
                    if !container.set_formatted(&name, &value) {
                        debug!(property = %name, "ignored unknown or unparsable property");
                    }
                }
            }
            None => {
                for _ in 0..count {
                    read_string(r)?;
                    read_string(r)?;
                }
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Saves a director graph as a binary script
#[derive(Default)]
pub struct BinaryWriter;

impl BinaryWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self
    }

    /// Save a director to a script file
    pub fn save(&self, director: &Director, path: &Path) -> Result<(), BinaryError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.save_to(director, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Save a director to any byte stream
    pub fn save_to(&self, director: &Director, w: &mut impl Write) -> Result<(), BinaryError> {
        let now = chrono::Utc::now().to_rfc3339();

        write_f32(w, BINARY_SCRIPT_VERSION)?;
        write_string(w, director.created.as_deref().unwrap_or(&now))?;
        write_string(w, &now)?;
        write_string(w, director.script_type())?;

        write_i32(w, director.libraries().len() as i32)?;
        for library in director.libraries() {
            write_string(w, library)?;
        }

        Self::save_property_container(w, director.properties())?;

        self.save_graph(director, director.root_graph(), w)?;
        self.save_link_connections(director, w)?;

        Ok(())
    }

    fn save_graph(
        &self,
        director: &Director,
        graph: GraphId,
        w: &mut impl Write,
    ) -> Result<(), BinaryError> {
        let g = director
            .graph(graph)
            .ok_or_else(|| BinaryError::Malformed("dangling graph id".to_string()))?;

        write_i32(w, graph.0 as i32)?;
        write_string(w, &g.uuid().to_string())?;
        Self::save_property_container(w, g.properties())?;

        for section in [g.event_nodes(), g.action_nodes(), g.value_nodes()] {
            write_i32(w, section.len() as i32)?;
            for &node in section {
                self.save_node(director, node, w)?;
            }
        }

        write_i32(w, g.subgraphs().len() as i32)?;
        for &sub in g.subgraphs() {
            self.save_graph(director, sub, w)?;
        }

        Ok(())
    }

    fn save_node(
        &self,
        director: &Director,
        node: NodeId,
        w: &mut impl Write,
    ) -> Result<(), BinaryError> {
        let n = director
            .node(node)
            .ok_or_else(|| BinaryError::Malformed("dangling node id".to_string()))?;

        write_string(w, &n.node_type().name)?;
        write_string(w, &n.node_type().category)?;
        write_i32(w, node.0 as i32)?;
        write_string(w, &n.uuid().to_string())?;

        Self::save_property_container(w, n.properties())?;

        // Only hidden input links need a record.
        let hidden_inputs: Vec<_> = n.inputs().iter().filter(|l| !l.visible).collect();
        write_i32(w, hidden_inputs.len() as i32)?;
        for link in hidden_inputs {
            write_string(w, &link.name)?;
        }

        // Output links with a non-default flag or connections.
        let outputs: Vec<_> = n
            .outputs()
            .iter()
            .filter(|l| !l.visible || !l.links.is_empty())
            .collect();
        write_i32(w, outputs.len() as i32)?;
        for link in outputs {
            write_string(w, &link.name)?;
            write_bool(w, link.visible)?;
        }

        // Value links with a non-default flag or connections.
        let values: Vec<_> = n
            .values()
            .iter()
            .filter(|l| !l.visible || !l.exposed || !l.links.is_empty())
            .collect();
        write_i32(w, values.len() as i32)?;
        for link in values {
            write_string(w, &link.name)?;
            write_bool(w, link.visible)?;
            write_bool(w, link.exposed)?;
        }

        Ok(())
    }

    fn save_link_connections(
        &self,
        director: &Director,
        w: &mut impl Write,
    ) -> Result<(), BinaryError> {
        let mut chain = Vec::new();
        let mut value = Vec::new();

        for node in director.all_nodes() {
            let Some(n) = director.node(node) else { continue };
            for output in n.outputs() {
                for target in &output.links {
                    let Some(t) = director.node(target.node) else {
                        continue;
                    };
                    chain.push((node, n.uuid(), target.node, t.uuid(), output.name.clone(), target.link.clone()));
                }
            }
            for link in n.values() {
                for &value_node in &link.links {
                    let Some(v) = director.node(value_node) else {
                        continue;
                    };
                    value.push((node, n.uuid(), value_node, v.uuid(), link.name.clone()));
                }
            }
        }

        write_i32(w, chain.len() as i32)?;
        for (from_id, from_uuid, to_id, to_uuid, output_name, input_name) in chain {
            write_i32(w, from_id.0 as i32)?;
            write_string(w, &from_uuid.to_string())?;
            write_i32(w, to_id.0 as i32)?;
            write_string(w, &to_uuid.to_string())?;
            write_string(w, &output_name)?;
            write_string(w, &input_name)?;
        }

        write_i32(w, value.len() as i32)?;
        for (from_id, from_uuid, to_id, to_uuid, link_name) in value {
            write_i32(w, from_id.0 as i32)?;
            write_string(w, &from_uuid.to_string())?;
            write_i32(w, to_id.0 as i32)?;
            write_string(w, &to_uuid.to_string())?;
            write_string(w, &link_name)?;
        }

        Ok(())
    }

    fn save_property_container(
        w: &mut impl Write,
        container: &director_types::PropertyContainer,
    ) -> Result<(), BinaryError> {
        let savable: Vec<_> = container.savable().collect();
        write_i32(w, savable.len() as i32)?;
        for property in savable {
            write_string(w, &property.name)?;
            write_string(w, &property.value.format())?;
        }
        Ok(())
    }
}
