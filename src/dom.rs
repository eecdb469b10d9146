//! In-process document tree of media elements with mutation notifications

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Identity of a node in a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Guess the element kind from a file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mp4" | "m4v" | "mkv" | "mov" | "webm" | "avi") => MediaKind::Video,
            _ => MediaKind::Audio,
        }
    }
}

/// A playable media element
#[derive(Debug, Clone, PartialEq)]
pub struct MediaElement {
    pub id: ElementId,
    pub kind: MediaKind,
    /// File the element plays, if any
    pub src: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Media(MediaElement),
    Container(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: ElementId,
    pub kind: NodeKind,
}

impl Node {
    pub fn media(id: u64, kind: MediaKind, src: Option<PathBuf>) -> Self {
        let id = ElementId(id);
        Node {
            id,
            kind: NodeKind::Media(MediaElement { id, kind, src }),
        }
    }

    pub fn container(id: u64, children: Vec<Node>) -> Self {
        Node {
            id: ElementId(id),
            kind: NodeKind::Container(children),
        }
    }

    /// This node if it is media, plus every media element below it
    pub fn media_elements(&self) -> Vec<&MediaElement> {
        let mut out = Vec::new();
        self.collect_media(&mut out);
        out
    }

    fn collect_media<'a>(&'a self, out: &mut Vec<&'a MediaElement>) {
        match &self.kind {
            NodeKind::Media(element) => out.push(element),
            NodeKind::Container(children) => {
                for child in children {
                    child.collect_media(out);
                }
            }
        }
    }

    fn remove_descendant(&mut self, id: ElementId) -> Option<Node> {
        let NodeKind::Container(children) = &mut self.kind else {
            return None;
        };
        remove_from(children, id)
    }
}

fn remove_from(nodes: &mut Vec<Node>, id: ElementId) -> Option<Node> {
    if let Some(index) = nodes.iter().position(|n| n.id == id) {
        return Some(nodes.remove(index));
    }
    nodes.iter_mut().find_map(|n| n.remove_descendant(id))
}

/// One batch of tree changes, delivered to observers in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    pub added: Vec<Node>,
    pub removed: Vec<Node>,
}

/// A change requested by whoever scripts the page
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEdit {
    Insert(Node),
    Remove(ElementId),
    ReplaceBody(Vec<Node>),
}

/// Stream of mutations from a [`Document`]
pub type MutationReceiver = mpsc::UnboundedReceiver<Mutation>;

/// The page: top-level nodes plus the observers watching them
#[derive(Debug, Default)]
pub struct Document {
    body: Vec<Node>,
    observers: Vec<mpsc::UnboundedSender<Mutation>>,
}

impl Document {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            observers: Vec::new(),
        }
    }

    /// Every media element in the document, in tree order
    pub fn query_media(&self) -> Vec<&MediaElement> {
        self.body.iter().flat_map(Node::media_elements).collect()
    }

    /// Subscribe to every future mutation, including nested subtrees
    pub fn observe(&mut self) -> MutationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Insert several subtrees at the top level as one mutation
    pub fn insert_all(&mut self, nodes: Vec<Node>) {
        if nodes.is_empty() {
            return;
        }
        self.body.extend(nodes.iter().cloned());
        self.notify(Mutation {
            added: nodes,
            removed: Vec::new(),
        });
    }

    pub fn insert(&mut self, node: Node) {
        self.insert_all(vec![node]);
    }

    /// Remove the node with `id` wherever it sits, along with its subtree
    pub fn remove(&mut self, id: ElementId) -> Option<Node> {
        let node = remove_from(&mut self.body, id)?;
        self.notify(Mutation {
            added: Vec::new(),
            removed: vec![node.clone()],
        });
        Some(node)
    }

    /// Swap the whole body for new content in a single mutation
    pub fn replace_body(&mut self, nodes: Vec<Node>) {
        let removed = std::mem::replace(&mut self.body, nodes.clone());
        self.notify(Mutation {
            added: nodes,
            removed,
        });
    }

    /// Apply an edit, notifying observers of whatever changed
    pub fn apply(&mut self, edit: DocumentEdit) {
        match edit {
            DocumentEdit::Insert(node) => self.insert(node),
            DocumentEdit::Remove(id) => {
                if self.remove(id).is_none() {
                    tracing::debug!(element = id.0, "Remove of unknown node ignored");
                }
            }
            DocumentEdit::ReplaceBody(nodes) => self.replace_body(nodes),
        }
    }

    fn notify(&mut self, mutation: Mutation) {
        self.observers.retain(|tx| tx.send(mutation.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(elements: Vec<&MediaElement>) -> Vec<u64> {
        elements.iter().map(|e| e.id.0).collect()
    }

    #[test]
    fn test_query_finds_nested_media() {
        let document = Document::new(vec![
            Node::media(1, MediaKind::Audio, None),
            Node::container(
                2,
                vec![
                    Node::container(3, vec![Node::media(4, MediaKind::Video, None)]),
                    Node::media(5, MediaKind::Audio, None),
                ],
            ),
        ]);
        assert_eq!(ids(document.query_media()), vec![1, 4, 5]);
    }

    #[test]
    fn test_observers_see_nested_removals() {
        let mut document = Document::new(vec![Node::container(
            1,
            vec![Node::container(2, vec![Node::media(3, MediaKind::Audio, None)])],
        )]);
        let mut observer = document.observe();

        let removed = document.remove(ElementId(2)).unwrap();
        assert_eq!(ids(removed.media_elements()), vec![3]);
        assert!(document.query_media().is_empty());

        let mutation = observer.try_recv().unwrap();
        assert!(mutation.added.is_empty());
        assert_eq!(mutation.removed, vec![removed]);

        assert!(document.remove(ElementId(99)).is_none());
        assert!(observer.try_recv().is_err());
    }

    #[test]
    fn test_replace_body_is_one_mutation() {
        let mut document = Document::new(vec![Node::media(1, MediaKind::Video, None)]);
        let mut observer = document.observe();
        document.replace_body(vec![Node::container(
            7,
            vec![Node::media(8, MediaKind::Video, None)],
        )]);

        let mutation = observer.try_recv().unwrap();
        assert_eq!(mutation.removed.len(), 1);
        assert_eq!(mutation.added.len(), 1);
        assert_eq!(ids(document.query_media()), vec![8]);
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("clip.MP4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("song.flac")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Audio);
    }

    #[test]
    fn test_dropped_observers_are_forgotten() {
        let mut document = Document::default();
        drop(document.observe());
        document.insert(Node::media(1, MediaKind::Audio, None));
        assert!(document.observers.is_empty());
    }
}
