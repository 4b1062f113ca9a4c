//! Dependency graph traversal shared by validation and topological sorting
//!
//! Depth-first search with three-color marking: white (unvisited), gray (on
//! the current path) and black (finished). Reaching a gray node again closes
//! a cycle. Back edges alone can miss steps that only join a cycle through an
//! already finished node, so full cycle membership comes from Tarjan's
//! strongly connected components over the same graph.

use crate::core::step::Step;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Borrowed view of the step graph, in declaration order
pub(crate) struct DependencyGraph<'a> {
    order: Vec<&'a str>,
    dependencies: HashMap<&'a str, &'a [String]>,
}

impl<'a> DependencyGraph<'a> {
    /// Build from steps; on duplicate ids the first declaration wins
    pub(crate) fn from_steps(steps: &'a [Step]) -> Self {
        let mut order = Vec::with_capacity(steps.len());
        let mut dependencies = HashMap::with_capacity(steps.len());
        for step in steps {
            if !dependencies.contains_key(step.id()) {
                order.push(step.id());
                dependencies.insert(step.id(), step.dependencies());
            }
        }
        Self { order, dependencies }
    }

    /// Every cycle closed by a back edge during a full traversal.
    ///
    /// Each cycle is reported as a path starting and ending at the repeated node.
    pub(crate) fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut walk = Walk::new(self);
        for &id in &self.order {
            if walk.color(id) == Color::White {
                walk.visit(id);
            }
        }
        walk.cycles
    }

    /// Strongly connected components that contain a cycle.
    ///
    /// A component qualifies when it has more than one step, or a single step
    /// that depends on itself. Members and components keep declaration order.
    pub(crate) fn cyclic_components(&self) -> Vec<Vec<String>> {
        let mut tarjan = Tarjan::new(self);
        for &id in &self.order {
            if !tarjan.visited(id) {
                tarjan.connect(id);
            }
        }

        let position: HashMap<&str, usize> = self.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let rank = |id: &str| position.get(id).copied().unwrap_or(usize::MAX);
        let mut components: Vec<Vec<&str>> = tarjan
            .components
            .into_iter()
            .filter(|c| c.len() > 1 || c.first().is_some_and(|id| self.depends_on_itself(*id)))
            .collect();
        for component in &mut components {
            component.sort_by_key(|id| rank(*id));
        }
        components.sort_by_key(|c| c.first().map_or(usize::MAX, |id| rank(*id)));

        components
            .into_iter()
            .map(|c| c.into_iter().map(str::to_string).collect())
            .collect()
    }

    fn depends_on_itself(&self, id: &str) -> bool {
        self.dependencies
            .get(id)
            .is_some_and(|deps| deps.iter().any(|dep| dep == id))
    }

    /// Linear order consistent with every dependency edge, or the first cycle found
    pub(crate) fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut walk = Walk::new(self);
        for &id in &self.order {
            if walk.color(id) == Color::White {
                walk.visit(id);
            }
            if let Some(cycle) = walk.cycles.first() {
                return Err(cycle.clone());
            }
        }
        Ok(walk.finished.into_iter().map(str::to_string).collect())
    }
}

struct Walk<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    colors: HashMap<&'a str, Color>,
    path: Vec<&'a str>,
    finished: Vec<&'a str>,
    cycles: Vec<Vec<String>>,
}

impl<'g, 'a> Walk<'g, 'a> {
    fn new(graph: &'g DependencyGraph<'a>) -> Self {
        Self {
            graph,
            colors: HashMap::new(),
            path: Vec::new(),
            finished: Vec::new(),
            cycles: Vec::new(),
        }
    }

    fn color(&self, id: &str) -> Color {
        self.colors.get(id).copied().unwrap_or(Color::White)
    }

    fn visit(&mut self, id: &'a str) {
        self.colors.insert(id, Color::Gray);
        self.path.push(id);

        let graph = self.graph;
        let deps = graph.dependencies.get(id).copied().unwrap_or(&[]);
        for dep in deps {
            // Dangling references are reported by validation, not here
            let Some((&dep_id, _)) = graph.dependencies.get_key_value(dep.as_str()) else {
                continue;
            };
            match self.color(dep_id) {
                Color::White => self.visit(dep_id),
                Color::Gray => {
                    let start = self.path.iter().position(|p| *p == dep_id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        self.path[start..].iter().map(|p| p.to_string()).collect();
                    cycle.push(dep_id.to_string());
                    self.cycles.push(cycle);
                }
                Color::Black => {}
            }
        }

        self.path.pop();
        self.colors.insert(id, Color::Black);
        self.finished.push(id);
    }
}

struct Tarjan<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    next_index: usize,
    // (discovery index, lowlink)
    links: HashMap<&'a str, (usize, usize)>,
    stack: Vec<&'a str>,
    on_stack: HashSet<&'a str>,
    components: Vec<Vec<&'a str>>,
}

impl<'g, 'a> Tarjan<'g, 'a> {
    fn new(graph: &'g DependencyGraph<'a>) -> Self {
        Self {
            graph,
            next_index: 0,
            links: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashSet::new(),
            components: Vec::new(),
        }
    }

    fn visited(&self, id: &str) -> bool {
        self.links.contains_key(id)
    }

    fn index(&self, id: &str) -> usize {
        self.links.get(id).map_or(usize::MAX, |link| link.0)
    }

    fn lowlink(&self, id: &str) -> usize {
        self.links.get(id).map_or(usize::MAX, |link| link.1)
    }

    fn lower(&mut self, id: &'a str, candidate: usize) {
        if let Some(link) = self.links.get_mut(id) {
            link.1 = link.1.min(candidate);
        }
    }

    fn connect(&mut self, id: &'a str) {
        self.links.insert(id, (self.next_index, self.next_index));
        self.next_index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        let graph = self.graph;
        let deps = graph.dependencies.get(id).copied().unwrap_or(&[]);
        for dep in deps {
            let Some((&dep_id, _)) = graph.dependencies.get_key_value(dep.as_str()) else {
                continue;
            };
            if !self.visited(dep_id) {
                self.connect(dep_id);
                let low = self.lowlink(dep_id);
                self.lower(id, low);
            } else if self.on_stack.contains(dep_id) {
                let index = self.index(dep_id);
                self.lower(id, index);
            }
        }

        if self.lowlink(id) == self.index(id) {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member);
                if member == id {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
