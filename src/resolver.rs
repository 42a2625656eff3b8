//! `$ref` resolution across one or more schema documents.
//!
//! [`RefResolver::init`] walks every root document once and flattens the
//! trees into an arena of [`Node`]s. A node's parent is an index into that
//! arena, so the tree stays singly owned by the parsed [`Schema`] documents.
//!
//! References take the form `<document-id>#<json-pointer>`. An empty
//! document id means the referencing node's own document. Pointers may walk
//! through `properties`, `definitions` (or `$defs`), `items` and
//! `additionalProperties`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Index of a node in the resolver arena.
pub type NodeId = usize;

/// Which keyword of its parent a node was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElement {
    Root,
    Properties,
    Definitions,
    Items,
    AdditionalProperties,
}

impl PathElement {
    pub fn as_str(self) -> &'static str {
        match self {
            PathElement::Root => "",
            PathElement::Properties => "properties",
            PathElement::Definitions => "definitions",
            PathElement::Items => "items",
            PathElement::AdditionalProperties => "additionalProperties",
        }
    }
}

/// A schema node plus its position in the document set.
#[derive(Debug)]
pub struct Node<'a> {
    pub schema: &'a Schema,
    /// Non-owning link to the enclosing node. `None` for document roots.
    pub parent: Option<NodeId>,
    /// Index of the root document this node belongs to.
    pub document: usize,
    /// Property or definition name; `<parent key>Items` for array items;
    /// empty for roots and `additionalProperties` schemas.
    pub json_key: String,
    pub path_element: PathElement,
    /// Child property nodes, in key order.
    pub properties: Vec<(&'a str, NodeId)>,
    pub items: Option<NodeId>,
    pub additional_properties: Option<NodeId>,
}

/// Resolves `$ref` strings to nodes of the supplied root documents.
#[derive(Debug)]
pub struct RefResolver<'a> {
    roots: &'a [Schema],
    nodes: Vec<Node<'a>>,
    root_ids: Vec<NodeId>,
    /// (document, canonical pointer) -> node
    by_pointer: HashMap<(usize, String), NodeId>,
    /// Normalized `$id` -> document
    documents: HashMap<String, usize>,
}

impl<'a> RefResolver<'a> {
    /// Create a resolver over `roots`. [`RefResolver::init`] must run before
    /// any lookup.
    pub fn new(roots: &'a [Schema]) -> Self {
        RefResolver {
            roots,
            nodes: Vec::new(),
            root_ids: Vec::new(),
            by_pointer: HashMap::new(),
            documents: HashMap::new(),
        }
    }

    /// Index every node reachable from the root documents, assigning parent
    /// links, json keys and path elements.
    pub fn init(&mut self) {
        self.nodes.clear();
        self.root_ids.clear();
        self.by_pointer.clear();
        self.documents.clear();

        let roots = self.roots;
        for (document, root) in roots.iter().enumerate() {
            let id = normalize_document_id(&root.id);
            if !id.is_empty() {
                if let Some(previous) = self.documents.get(id) {
                    tracing::warn!(
                        id,
                        first = previous,
                        duplicate = document,
                        "duplicate document id, keeping the first"
                    );
                } else {
                    self.documents.insert(id.to_string(), document);
                }
            }
            let root_id = self.index(root, None, document, String::new(), PathElement::Root, String::new());
            self.root_ids.push(root_id);
        }

        tracing::debug!(
            documents = roots.len(),
            nodes = self.nodes.len(),
            "indexed schema documents"
        );
    }

    fn index(
        &mut self,
        schema: &'a Schema,
        parent: Option<NodeId>,
        document: usize,
        json_key: String,
        path_element: PathElement,
        pointer: String,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            schema,
            parent,
            document,
            json_key: json_key.clone(),
            path_element,
            properties: Vec::with_capacity(schema.properties.len()),
            items: None,
            additional_properties: None,
        });
        self.by_pointer.insert((document, pointer.clone()), id);

        for (key, child) in &schema.properties {
            let child_pointer = format!("{pointer}/properties/{}", escape_token(key));
            let child_id = self.index(
                child,
                Some(id),
                document,
                key.clone(),
                PathElement::Properties,
                child_pointer,
            );
            self.nodes[id].properties.push((key.as_str(), child_id));
        }

        for (key, child) in &schema.definitions {
            let child_pointer = format!("{pointer}/definitions/{}", escape_token(key));
            self.index(
                child,
                Some(id),
                document,
                key.clone(),
                PathElement::Definitions,
                child_pointer,
            );
        }

        if let Some(items) = &schema.items {
            let items_id = self.index(
                items,
                Some(id),
                document,
                format!("{json_key}Items"),
                PathElement::Items,
                format!("{pointer}/items"),
            );
            self.nodes[id].items = Some(items_id);
        }

        if let Some(ap) = schema.additional_properties_schema() {
            let ap_id = self.index(
                ap,
                Some(id),
                document,
                String::new(),
                PathElement::AdditionalProperties,
                format!("{pointer}/additionalProperties"),
            );
            self.nodes[id].additional_properties = Some(ap_id);
        }

        id
    }

    pub fn node(&self, id: NodeId) -> &Node<'a> {
        &self.nodes[id]
    }

    /// Number of indexed nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Arena ids of the root documents, in input order.
    pub fn root_ids(&self) -> &[NodeId] {
        &self.root_ids
    }

    /// Resolve the `$ref` of node `id` to the node it designates.
    pub fn get_schema_by_reference(&self, id: NodeId) -> Result<NodeId> {
        let node = &self.nodes[id];
        let reference = node.schema.reference.as_str();
        let not_found = || Error::ReferenceNotFound {
            reference: reference.to_string(),
            path: self.get_path(id),
        };

        if reference.is_empty() {
            return Err(not_found());
        }

        let (document_id, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let document = self
            .find_document(node.document, document_id)
            .ok_or_else(not_found)?;
        let pointer = canonical_pointer(fragment).ok_or_else(not_found)?;

        self.by_pointer
            .get(&(document, pointer))
            .copied()
            .ok_or_else(not_found)
    }

    /// Find the document a reference's identifier part designates, relative
    /// to the referencing document `from`.
    fn find_document(&self, from: usize, document_id: &str) -> Option<usize> {
        if document_id.is_empty() {
            return Some(from);
        }
        let wanted = normalize_document_id(document_id);
        if let Some(&doc) = self.documents.get(wanted) {
            return Some(doc);
        }

        let base = self.roots.get(from).map(|r| r.id.as_str()).unwrap_or("");
        let joined = join_document_id(normalize_document_id(base), wanted);
        if let Some(&doc) = self.documents.get(joined.as_str()) {
            return Some(doc);
        }

        // Bare names like "root2" match ids ending in "/root2".
        let suffix = format!("/{wanted}");
        self.roots
            .iter()
            .position(|r| normalize_document_id(&r.id).ends_with(&suffix))
    }

    /// A human-readable location for node `id`: `<document-id>#<pointer>`.
    ///
    /// Reconstructed from parent links; purely diagnostic.
    pub fn get_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = &self.nodes[cur];
            match node.path_element {
                PathElement::Root => {}
                PathElement::Properties | PathElement::Definitions => {
                    segments.push(format!(
                        "/{}/{}",
                        node.path_element.as_str(),
                        escape_token(&node.json_key)
                    ));
                }
                PathElement::Items | PathElement::AdditionalProperties => {
                    segments.push(format!("/{}", node.path_element.as_str()));
                }
            }
            current = node.parent;
        }
        segments.reverse();

        let document = self
            .roots
            .get(self.nodes[id].document)
            .map(|r| normalize_document_id(&r.id))
            .unwrap_or("");
        format!("{document}#{}", segments.concat())
    }
}

fn normalize_document_id(id: &str) -> &str {
    id.trim_end_matches('#')
}

/// Resolve a relative document identifier against a base identifier.
fn join_document_id(base: &str, relative: &str) -> String {
    if base.is_empty() || relative.contains("://") {
        return relative.to_string();
    }
    if let Some(absolute) = relative.strip_prefix('/') {
        let authority_end = base
            .find("://")
            .and_then(|scheme| base[scheme + 3..].find('/').map(|i| scheme + 3 + i))
            .unwrap_or(base.len());
        return format!("{}/{absolute}", &base[..authority_end]);
    }
    match base.rfind('/') {
        Some(i) => format!("{}{relative}", &base[..=i]),
        None => relative.to_string(),
    }
}

/// Canonicalize a JSON pointer fragment. Returns `None` when the fragment is
/// not a pointer (e.g. a plain-name anchor).
fn canonical_pointer(fragment: &str) -> Option<String> {
    if fragment.is_empty() {
        return Some(String::new());
    }
    let rest = fragment.strip_prefix('/')?;
    let mut out = String::with_capacity(fragment.len());
    for token in rest.split('/') {
        let token = unescape_token(token);
        let token = if token == "$defs" { "definitions".to_string() } else { token };
        out.push('/');
        out.push_str(&escape_token(&token));
    }
    Some(out)
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Schema {
        Schema::parse(json.as_bytes()).unwrap()
    }

    fn find<'a>(resolver: &RefResolver<'a>, path: &str) -> NodeId {
        (0..resolver.len())
            .find(|&id| resolver.get_path(id) == path)
            .unwrap_or_else(|| panic!("no node at {path}"))
    }

    #[test]
    fn init_assigns_parents_and_keys() {
        let roots = [parse(
            r#"{
                "properties": {
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "labels": {"additionalProperties": {"type": "string"}}
                },
                "definitions": {"address": {"type": "object"}}
            }"#,
        )];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();

        assert_eq!(resolver.len(), 6);
        let root = resolver.root_ids()[0];
        assert_eq!(resolver.node(root).parent, None);
        assert_eq!(resolver.get_path(root), "#");

        let tags = find(&resolver, "#/properties/tags");
        assert_eq!(resolver.node(tags).parent, Some(root));
        assert_eq!(resolver.node(tags).json_key, "tags");

        let items = find(&resolver, "#/properties/tags/items");
        assert_eq!(resolver.node(items).json_key, "tagsItems");
        assert_eq!(resolver.node(items).path_element, PathElement::Items);

        let ap = find(&resolver, "#/properties/labels/additionalProperties");
        assert_eq!(resolver.node(ap).json_key, "");

        let address = find(&resolver, "#/definitions/address");
        assert_eq!(resolver.node(address).path_element, PathElement::Definitions);
    }

    #[test]
    fn resolves_same_document_reference() {
        let roots = [parse(
            r##"{
                "properties": {"home": {"$ref": "#/definitions/address"}},
                "definitions": {"address": {"type": "object"}}
            }"##,
        )];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();

        let home = find(&resolver, "#/properties/home");
        let target = resolver.get_schema_by_reference(home).unwrap();
        assert_eq!(resolver.get_path(target), "#/definitions/address");
    }

    #[test]
    fn resolves_root_and_defs_references() {
        let roots = [parse(
            r##"{
                "properties": {"self": {"$ref": "#"}, "x": {"$ref": "#/$defs/x"}},
                "$defs": {"x": {"type": "string"}}
            }"##,
        )];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();

        let this = find(&resolver, "#/properties/self");
        assert_eq!(resolver.get_schema_by_reference(this).unwrap(), resolver.root_ids()[0]);
        let x = find(&resolver, "#/properties/x");
        let target = resolver.get_schema_by_reference(x).unwrap();
        assert_eq!(resolver.get_path(target), "#/definitions/x");
    }

    #[test]
    fn resolves_cross_document_references() {
        let roots = [
            parse(
                r##"{
                    "$id": "http://example.com/schema/root1",
                    "properties": {
                        "relative": {"$ref": "root2#/definitions/address"},
                        "absolute": {"$ref": "http://example.com/schema/root2#/definitions/address"}
                    }
                }"##,
            ),
            parse(
                r#"{
                    "$id": "http://example.com/schema/root2",
                    "definitions": {"address": {"type": "object"}}
                }"#,
            ),
        ];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();

        for prop in ["relative", "absolute"] {
            let id = find(&resolver, &format!("http://example.com/schema/root1#/properties/{prop}"));
            let target = resolver.get_schema_by_reference(id).unwrap();
            assert_eq!(resolver.node(target).document, 1);
            assert_eq!(
                resolver.get_path(target),
                "http://example.com/schema/root2#/definitions/address"
            );
        }
    }

    #[test]
    fn escaped_pointer_tokens() {
        let roots = [parse(
            r##"{
                "properties": {"p": {"$ref": "#/definitions/a~1b"}},
                "definitions": {"a/b": {"type": "string"}}
            }"##,
        )];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();
        let p = find(&resolver, "#/properties/p");
        assert!(resolver.get_schema_by_reference(p).is_ok());
    }

    #[test]
    fn missing_reference_reports_reference_and_path() {
        let roots = [parse(
            r##"{
                "properties": {
                    "gone": {"$ref": "#/definitions/missing"},
                    "other": {"$ref": "elsewhere#/definitions/a"},
                    "anchor": {"$ref": "#anchor"}
                }
            }"##,
        )];
        let mut resolver = RefResolver::new(&roots);
        resolver.init();

        let gone = find(&resolver, "#/properties/gone");
        match resolver.get_schema_by_reference(gone) {
            Err(Error::ReferenceNotFound { reference, path }) => {
                assert_eq!(reference, "#/definitions/missing");
                assert_eq!(path, "#/properties/gone");
            }
            other => panic!("expected ReferenceNotFound, got {other:?}"),
        }
        for prop in ["other", "anchor"] {
            let id = find(&resolver, &format!("#/properties/{prop}"));
            assert!(matches!(
                resolver.get_schema_by_reference(id),
                Err(Error::ReferenceNotFound { .. })
            ));
        }
    }

    #[test]
    fn document_id_joining() {
        assert_eq!(
            join_document_id("http://example.com/schema/root1", "root2"),
            "http://example.com/schema/root2"
        );
        assert_eq!(
            join_document_id("http://example.com/schema/root1", "/other"),
            "http://example.com/other"
        );
        assert_eq!(join_document_id("", "root2"), "root2");
        assert_eq!(join_document_id("root1", "root2"), "root2");
    }
}
