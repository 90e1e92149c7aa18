use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::SceneDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneTableError {
    #[error("scene at index {index} has an empty key")]
    EmptyKey { index: usize },
    #[error("duplicate scene key '{key}' at indices {first} and {second}")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },
    #[error("scene '{scene}' references unknown scene '{target}' in {field}")]
    UnknownReference {
        scene: String,
        field: &'static str,
        target: String,
    },
    #[error("following next-scene links from '{start}' loops back to '{repeated}'")]
    Cycle { start: String, repeated: String },
    #[error("more than one terminal scene is reachable from the start: {keys:?}")]
    MultipleTerminals { keys: Vec<String> },
}

/// Ordered, validated list of scene descriptors.
///
/// Validation guarantees unique keys, that every link resolves, that
/// following `next_scene` from the first scene never loops, and that exactly
/// one terminal scene is reachable from the first scene over any link.
#[derive(Debug, Clone, Default)]
pub struct SceneTable {
    descriptors: Vec<SceneDescriptor>,
    index_by_key: HashMap<String, usize>,
    fingerprint: String,
}

impl SceneTable {
    pub fn new(descriptors: Vec<SceneDescriptor>) -> Result<Self, SceneTableError> {
        let mut index_by_key = HashMap::<String, usize>::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.key.is_empty() {
                return Err(SceneTableError::EmptyKey { index });
            }
            if let Some(first) = index_by_key.insert(descriptor.key.clone(), index) {
                return Err(SceneTableError::DuplicateKey {
                    key: descriptor.key.clone(),
                    first,
                    second: index,
                });
            }
        }

        for descriptor in &descriptors {
            for (field, target) in [
                ("nextScene", &descriptor.next_scene),
                ("onComplete", &descriptor.on_complete),
                ("onFail", &descriptor.on_fail),
            ] {
                if let Some(target) = target {
                    if !index_by_key.contains_key(target) {
                        return Err(SceneTableError::UnknownReference {
                            scene: descriptor.key.clone(),
                            field,
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        if let Some(start) = descriptors.first() {
            let mut visited = HashSet::<usize>::new();
            let mut cursor = 0usize;
            loop {
                if !visited.insert(cursor) {
                    return Err(SceneTableError::Cycle {
                        start: start.key.clone(),
                        repeated: descriptors[cursor].key.clone(),
                    });
                }
                match &descriptors[cursor].next_scene {
                    Some(next) => cursor = index_by_key[next],
                    None => break,
                }
            }

            let terminals = reachable_terminals(&descriptors, &index_by_key);
            if terminals.len() > 1 {
                return Err(SceneTableError::MultipleTerminals {
                    keys: terminals
                        .into_iter()
                        .map(|index| descriptors[index].key.clone())
                        .collect(),
                });
            }
        }

        let fingerprint = fingerprint_descriptors(&descriptors);
        Ok(Self {
            descriptors,
            index_by_key,
            fingerprint,
        })
    }

    pub fn empty() -> Self {
        Self {
            fingerprint: fingerprint_descriptors(&[]),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SceneDescriptor> {
        self.descriptors.get(index)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index_by_key.get(key).copied()
    }

    pub fn descriptors(&self) -> &[SceneDescriptor] {
        &self.descriptors
    }

    /// Lowercase hex SHA-256 over the ordered descriptors.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Indices of terminal scenes reachable from index 0 over next, onComplete
/// and onFail links, in table order.
fn reachable_terminals(
    descriptors: &[SceneDescriptor],
    index_by_key: &HashMap<String, usize>,
) -> Vec<usize> {
    let mut seen = HashSet::<usize>::from([0]);
    let mut pending = vec![0usize];
    let mut terminals = Vec::new();
    while let Some(index) = pending.pop() {
        let descriptor = &descriptors[index];
        if descriptor.is_terminal() {
            terminals.push(index);
        }
        let links = [
            &descriptor.next_scene,
            &descriptor.on_complete,
            &descriptor.on_fail,
        ];
        for target in links.into_iter().flatten() {
            if let Some(&target) = index_by_key.get(target) {
                if seen.insert(target) {
                    pending.push(target);
                }
            }
        }
    }
    terminals.sort_unstable();
    terminals
}

fn fingerprint_descriptors(descriptors: &[SceneDescriptor]) -> String {
    let mut hasher = Sha256::new();
    for descriptor in descriptors {
        hasher.update(descriptor.key.as_bytes());
        hasher.update([0u8]);
        hasher.update(descriptor.kind.as_str().as_bytes());
        hasher.update([0u8]);
        for link in [
            &descriptor.next_scene,
            &descriptor.on_complete,
            &descriptor.on_fail,
        ] {
            hasher.update(link.as_deref().unwrap_or("").as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([1u8]);
    }
    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_table() -> Vec<SceneDescriptor> {
        vec![
            SceneDescriptor::presentation("Menu", Some("Intro")),
            SceneDescriptor::presentation("Intro", Some("Puzzle")),
            SceneDescriptor::challenge("Puzzle", Some("End"), Some("End")),
            SceneDescriptor::presentation("End", None),
        ]
    }

    #[test]
    fn valid_table_indexes_keys() {
        let table = SceneTable::new(linear_table()).expect("table");
        assert_eq!(table.len(), 4);
        assert_eq!(table.index_of("Puzzle"), Some(2));
        assert_eq!(table.index_of("Missing"), None);
        assert_eq!(table.get(3).map(|d| d.is_terminal()), Some(true));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut descriptors = linear_table();
        descriptors.push(SceneDescriptor::presentation("Intro", None));
        let error = SceneTable::new(descriptors).expect_err("duplicate");
        assert_eq!(
            error,
            SceneTableError::DuplicateKey {
                key: "Intro".to_string(),
                first: 1,
                second: 4,
            }
        );
    }

    #[test]
    fn rejects_dangling_on_complete_reference() {
        let mut descriptors = linear_table();
        descriptors[2].on_complete = Some("Achievement9".to_string());
        let error = SceneTable::new(descriptors).expect_err("dangling");
        assert!(matches!(
            error,
            SceneTableError::UnknownReference { field: "onComplete", .. }
        ));
    }

    #[test]
    fn rejects_next_scene_cycle() {
        let descriptors = vec![
            SceneDescriptor::presentation("A", Some("B")),
            SceneDescriptor::presentation("B", Some("A")),
            SceneDescriptor::presentation("End", None),
        ];
        let error = SceneTable::new(descriptors).expect_err("cycle");
        assert_eq!(
            error,
            SceneTableError::Cycle {
                start: "A".to_string(),
                repeated: "A".to_string(),
            }
        );
    }

    #[test]
    fn rejects_second_terminal_reached_through_on_complete() {
        let descriptors = vec![
            SceneDescriptor::presentation("Menu", Some("Trial")),
            SceneDescriptor::challenge("Trial", Some("EndA"), Some("EndB")),
            SceneDescriptor::presentation("EndA", None),
            SceneDescriptor::presentation("EndB", None),
        ];
        assert_eq!(
            SceneTable::new(descriptors).expect_err("two endings"),
            SceneTableError::MultipleTerminals {
                keys: vec!["EndA".to_string(), "EndB".to_string()],
            }
        );
    }

    #[test]
    fn unreachable_terminal_is_tolerated() {
        let mut descriptors = linear_table();
        descriptors.push(SceneDescriptor::presentation("Orphan", None));
        let table = SceneTable::new(descriptors).expect("orphan is unreachable");
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn fail_link_back_to_itself_is_not_a_second_ending() {
        let mut descriptors = linear_table();
        descriptors[2].on_fail = Some("Puzzle".to_string());
        assert!(SceneTable::new(descriptors).is_ok());
    }

    #[test]
    fn rejects_empty_key() {
        let descriptors = vec![SceneDescriptor::presentation("", None)];
        assert_eq!(
            SceneTable::new(descriptors).expect_err("empty key"),
            SceneTableError::EmptyKey { index: 0 }
        );
    }

    #[test]
    fn empty_table_is_valid() {
        let table = SceneTable::new(Vec::new()).expect("empty");
        assert!(table.is_empty());
        assert_eq!(table.fingerprint(), SceneTable::empty().fingerprint());
    }

    #[test]
    fn fingerprint_tracks_links_not_just_keys() {
        let base = SceneTable::new(linear_table()).expect("base");
        let mut relinked = linear_table();
        relinked[2].on_complete = None;
        let relinked = SceneTable::new(relinked).expect("relinked");

        assert_eq!(base.fingerprint().len(), 64);
        assert_ne!(base.fingerprint(), relinked.fingerprint());
        assert_eq!(
            base.fingerprint(),
            SceneTable::new(linear_table()).expect("again").fingerprint()
        );
    }
}
