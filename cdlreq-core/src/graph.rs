//! Traceability graph construction
//!
//! Nodes are the requirement and specification identifiers in the store. Edges
//! come from `related_requirements` (requires) and `dependencies` (dependsOn).
//! Unresolvable edges are reported as dangling references and left out of the
//! graph; cycles among dependsOn edges are reported with their full path.

use serde::Serialize;
use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap};

use crate::defects::{canonicalize, Defect, DefectKind};
use crate::models::{RecordKind, SourceLocation};
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceabilityGraph {
    pub requirements: BTreeSet<String>,
    pub specifications: BTreeSet<String>,
    /// Specification -> requirements it implements (resolved edges only)
    pub requires: BTreeMap<String, BTreeSet<String>>,
    /// Specification -> specifications it depends on (resolved, no self edges)
    pub depends_on: BTreeMap<String, BTreeSet<String>>,
    /// Every distinct dependency cycle, each closed on its first element
    pub cycles: Vec<Vec<String>>,
}

impl TraceabilityGraph {
    /// Builds the graph from every record in the store, valid or not
    pub fn build(store: &RecordStore) -> (Self, Vec<Defect>) {
        let mut graph = TraceabilityGraph {
            requirements: store.requirements().map(|r| r.id.clone()).collect(),
            specifications: store.specifications().map(|s| s.id.clone()).collect(),
            ..Default::default()
        };
        let mut defects = Vec::new();

        for spec in store.specifications() {
            let location = store
                .location(&spec.id)
                .cloned()
                .unwrap_or_else(|| SourceLocation::file(""));
            let dangling = |field: &str, message: String| {
                Defect::new(DefectKind::DanglingReference, location.clone(), message)
                    .with_subject(spec.id.clone())
                    .with_field(field)
            };

            let requires = graph.requires.entry(spec.id.clone()).or_default();
            for req_id in &spec.related_requirements {
                if store.contains(RecordKind::Requirement, req_id) {
                    requires.insert(req_id.clone());
                } else {
                    defects.push(dangling(
                        "related_requirements",
                        format!("references non-existent requirement {}", req_id),
                    ));
                }
            }

            let depends_on = graph.depends_on.entry(spec.id.clone()).or_default();
            for dep_id in &spec.dependencies {
                if *dep_id == spec.id {
                    defects.push(dangling(
                        "dependencies",
                        format!("specification {} depends on itself", dep_id),
                    ));
                } else if store.contains(RecordKind::Specification, dep_id) {
                    depends_on.insert(dep_id.clone());
                } else {
                    defects.push(dangling(
                        "dependencies",
                        format!("depends on non-existent specification {}", dep_id),
                    ));
                }
            }
        }

        graph.cycles = find_cycles(&graph.specifications, &graph.depends_on);
        for cycle in &graph.cycles {
            let mut locations = Vec::new();
            for id in &cycle[..cycle.len() - 1] {
                if let Some(location) = store.location(id) {
                    locations.push(location.clone());
                }
            }
            defects.push(
                Defect::new(
                    DefectKind::DependencyCycle,
                    SourceLocation::file(""),
                    format!("circular dependency: {}", cycle.join(" -> ")),
                )
                .with_subject(cycle[0].clone())
                .with_field("dependencies")
                .with_locations(locations),
            );
        }

        canonicalize(&mut defects);
        log::debug!(
            "Built traceability graph: {} requirements, {} specifications, {} defects",
            graph.requirements.len(),
            graph.specifications.len(),
            defects.len()
        );
        (graph, defects)
    }

    /// Specifications that trace to a requirement, in identifier order
    pub fn specifications_for(&self, requirement_id: &str) -> Vec<&str> {
        self.requires
            .iter()
            .filter(|(_, reqs)| reqs.contains(requirement_id))
            .map(|(spec, _)| spec.as_str())
            .collect()
    }

    /// Requirements no specification traces to
    pub fn untraced_requirements(&self) -> Vec<&str> {
        let traced: BTreeSet<&str> = self
            .requires
            .values()
            .flat_map(|reqs| reqs.iter().map(String::as_str))
            .collect();
        self.requirements
            .iter()
            .map(String::as_str)
            .filter(|id| !traced.contains(id))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Three-colour depth-first search with an explicit stack
///
/// Start nodes and neighbours are visited in sorted order, so the same input
/// always yields the same cycles in the same order. A cycle is reported from
/// the back-edge target around to itself; rotations of an already reported
/// cycle are skipped.
fn find_cycles(
    nodes: &BTreeSet<String>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<Vec<String>> {
    let no_edges = BTreeSet::new();
    let neighbours = |node: &str| successors(edges, &no_edges, node);

    let mut color: HashMap<&str, Color> = nodes
        .iter()
        .map(|n| (n.as_str(), Color::Unvisited))
        .collect();
    let mut reported: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut cycles = Vec::new();

    for start in nodes {
        if color.get(start.as_str()) != Some(&Color::Unvisited) {
            continue;
        }

        color.insert(start.as_str(), Color::InProgress);
        let mut stack = vec![(start.as_str(), neighbours(start.as_str()))];

        loop {
            let Some((node, iter)) = stack.last_mut() else {
                break;
            };
            let node = *node;
            let next = iter.next();

            let Some(next) = next else {
                color.insert(node, Color::Done);
                stack.pop();
                continue;
            };

            match color.get(next.as_str()).copied().unwrap_or(Color::Done) {
                Color::Unvisited => {
                    color.insert(next.as_str(), Color::InProgress);
                    stack.push((next.as_str(), neighbours(next.as_str())));
                }
                Color::InProgress => {
                    if let Some(pos) = stack.iter().position(|(n, _)| *n == next.as_str()) {
                        let mut cycle: Vec<String> =
                            stack[pos..].iter().map(|(n, _)| n.to_string()).collect();
                        if reported.insert(rotation_key(&cycle)) {
                            cycle.push(next.clone());
                            cycles.push(cycle);
                        }
                    }
                }
                Color::Done => {}
            }
        }
    }

    cycles
}

fn successors<'a>(
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    no_edges: &'a BTreeSet<String>,
    node: &str,
) -> btree_set::Iter<'a, String> {
    edges.get(node).unwrap_or(no_edges).iter()
}

fn rotation_key(cycle: &[String]) -> Vec<String> {
    let min_pos = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[min_pos..]
        .iter()
        .chain(cycle[..min_pos].iter())
        .cloned()
        .collect()
}

/// One requirement with the specifications that trace to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub requirement: String,
    pub title: String,
    #[serde(rename = "type")]
    pub req_type: String,
    pub specifications: Vec<MatrixEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub id: String,
    pub title: String,
    pub implementation_unit: String,
    pub unit_test: String,
}

/// Requirements-to-specifications traceability matrix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceabilityMatrix {
    pub rows: Vec<MatrixRow>,
    pub untraced_requirements: Vec<String>,
}

impl TraceabilityMatrix {
    pub fn build(store: &RecordStore, graph: &TraceabilityGraph) -> Self {
        let rows = store
            .requirements()
            .map(|req| MatrixRow {
                requirement: req.id.clone(),
                title: req.title.clone(),
                req_type: req.req_type.clone(),
                specifications: graph
                    .specifications_for(&req.id)
                    .into_iter()
                    .filter_map(|id| store.get(id))
                    .filter_map(|stored| stored.record.as_specification())
                    .map(|spec| MatrixEntry {
                        id: spec.id.clone(),
                        title: spec.title.clone(),
                        implementation_unit: spec.implementation_unit.clone(),
                        unit_test: spec.unit_test.clone(),
                    })
                    .collect(),
            })
            .collect();

        TraceabilityMatrix {
            rows,
            untraced_requirements: graph
                .untraced_requirements()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Percentage of requirements traced by at least one specification
    pub fn traced_percent(&self) -> f64 {
        if self.rows.is_empty() {
            return 100.0;
        }
        let traced = self.rows.len() - self.untraced_requirements.len();
        (traced as f64 / self.rows.len() as f64) * 100.0
    }
}
