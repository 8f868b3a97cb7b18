

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{
    ConceptGraph, Concept, ConceptPath, GraphError, GraphStatistics, HopRange, LanguageCount, Relation,
    sort_by_weight_desc,
};


/// In-process concept graph. Concepts keep insertion order, which is the
/// "store order" callers observe. Relations are directed but traversal
/// follows them both ways.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConceptGraph {
    concepts: Vec<Concept>,
    index: HashMap<String, usize>,
    relations: Vec<Relation>,
    adjacency: HashMap<String, Vec<(String, usize)>>,
}

impl InMemoryConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-adding a known URI updates its label and language in place.
    pub fn add_concept(&mut self, uri: &str, label: &str, language: &str) -> &mut Self {
        let concept = Concept::new(uri, label, language);
        match self.index.get(uri) {
            Some(&i) => self.concepts[i] = concept,
            None => {
                self.index.insert(uri.to_string(), self.concepts.len());
                self.concepts.push(concept);
            }
        }
        self
    }

    /// Both endpoints must already exist.
    pub fn add_relation(
        &mut self,
        start: &str,
        end: &str,
        rel_type: &str,
        weight: f64,
    ) -> Result<&mut Self, GraphError> {
        let start_label = self.label_of(start)?;
        let end_label = self.label_of(end)?;

        let idx = self.relations.len();
        self.relations.push(Relation {
            rel_type: rel_type.to_string(),
            weight,
            start: start.to_string(),
            end: end.to_string(),
            start_label,
            end_label,
        });
        self.adjacency
            .entry(start.to_string())
            .or_default()
            .push((end.to_string(), idx));
        self.adjacency
            .entry(end.to_string())
            .or_default()
            .push((start.to_string(), idx));
        Ok(self)
    }

    fn label_of(&self, uri: &str) -> Result<String, GraphError> {
        self.concept(uri)
            .map(|c| c.label.clone())
            .ok_or_else(|| GraphError::InvalidArgument(format!("unknown concept {}", uri)))
    }

    pub fn concept(&self, uri: &str) -> Option<&Concept> {
        self.index.get(uri).map(|&i| &self.concepts[i])
    }

    fn neighbors(&self, uri: &str) -> &[(String, usize)] {
        self.adjacency.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
impl ConceptGraph for InMemoryConceptGraph {
    async fn match_by_label(
        &self,
        language: Option<&str>,
        substring: &str,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError> {
        let needle = substring.to_lowercase();
        Ok(self
            .concepts
            .iter()
            .filter(|c| language.is_none_or(|lang| c.language == lang))
            .filter(|c| c.label.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn expand_related(
        &self,
        uris: &[String],
        hops: HopRange,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError> {
        let seeds: HashSet<&str> = uris.iter().map(String::as_str).collect();
        let mut depth: HashMap<&str, u32> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for uri in uris {
            if self.index.contains_key(uri) && !depth.contains_key(uri.as_str()) {
                depth.insert(uri.as_str(), 0);
                queue.push_back(uri.as_str());
            }
        }

        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            let d = depth[current];
            if d >= hops.max {
                continue;
            }
            for (next, _) in self.neighbors(current) {
                if depth.contains_key(next.as_str()) {
                    continue;
                }
                depth.insert(next.as_str(), d + 1);
                queue.push_back(next.as_str());
                if hops.contains(d + 1) && !seeds.contains(next.as_str()) {
                    if let Some(concept) = self.concept(next) {
                        found.push(concept.clone());
                        if found.len() >= limit {
                            return Ok(found);
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    async fn relations_touching(&self, uris: &[String], limit: usize) -> Result<Vec<Relation>, GraphError> {
        let wanted: HashSet<&str> = uris.iter().map(String::as_str).collect();
        let mut relations: Vec<Relation> = self
            .relations
            .iter()
            .filter(|r| wanted.contains(r.start.as_str()) || wanted.contains(r.end.as_str()))
            .cloned()
            .collect();
        sort_by_weight_desc(&mut relations);
        relations.truncate(limit);
        Ok(relations)
    }

    async fn shortest_path(
        &self,
        from_uri: &str,
        to_uri: &str,
        max_hops: u32,
    ) -> Result<Option<ConceptPath>, GraphError> {
        if from_uri == to_uri || self.concept(from_uri).is_none() || self.concept(to_uri).is_none() {
            return Ok(None);
        }

        // node -> (parent, relation index)
        let mut parent: HashMap<&str, Option<(&str, usize)>> = HashMap::new();
        let mut depth: HashMap<&str, u32> = HashMap::new();
        let mut queue = VecDeque::new();
        parent.insert(from_uri, None);
        depth.insert(from_uri, 0);
        queue.push_back(from_uri);

        while let Some(current) = queue.pop_front() {
            if current == to_uri {
                break;
            }
            let d = depth[current];
            if d >= max_hops {
                continue;
            }
            for (next, rel_idx) in self.neighbors(current) {
                if parent.contains_key(next.as_str()) {
                    continue;
                }
                parent.insert(next.as_str(), Some((current, *rel_idx)));
                depth.insert(next.as_str(), d + 1);
                queue.push_back(next.as_str());
            }
        }

        if !parent.contains_key(to_uri) {
            return Ok(None);
        }

        let mut labels = Vec::new();
        let mut relation_types = Vec::new();
        let mut cursor = to_uri;
        while let Some(concept) = self.concept(cursor) {
            labels.push(concept.label.clone());
            match parent.get(cursor).copied().flatten() {
                Some((prev, rel_idx)) => {
                    relation_types.push(self.relations[rel_idx].rel_type.clone());
                    cursor = prev;
                }
                None => break,
            }
        }
        labels.reverse();
        relation_types.reverse();

        Ok(Some(ConceptPath {
            labels,
            relation_types,
        }))
    }

    async fn statistics(&self) -> Result<GraphStatistics, GraphError> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for concept in &self.concepts {
            *counts.entry(concept.language.as_str()).or_default() += 1;
        }
        let mut concepts_by_language: Vec<LanguageCount> = counts
            .into_iter()
            .map(|(language, count)| LanguageCount {
                language: language.to_string(),
                count,
            })
            .collect();
        concepts_by_language.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.language.cmp(&b.language)));

        Ok(GraphStatistics {
            total_concepts: self.concepts.len() as u64,
            total_relations: self.relations.len() as u64,
            concepts_by_language,
        })
    }

    async fn health(&self) -> Result<(), GraphError> {
        Ok(())
    }
}
