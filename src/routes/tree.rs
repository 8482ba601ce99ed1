//! Path trie: literal segments first, then one named wildcard per position.

use crate::error::RouteError;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// Something a route can point at.
pub trait Endpoint {
    /// Names the handler binds; every wildcard of its template must be among them.
    fn parameters(&self) -> &[String];
    /// Identity used by `replace_controller`.
    fn is_same(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard(String),
}

#[derive(Debug)]
struct Route<H> {
    template: String,
    names: Vec<String>,
    handler: H,
}

#[derive(Debug)]
struct Node<H> {
    literals: BTreeMap<String, Node<H>>,
    wildcard: Option<Box<Node<H>>>,
    route: Option<Route<H>>,
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Node {
            literals: BTreeMap::new(),
            wildcard: None,
            route: None,
        }
    }
}

/// A successful lookup: the handler and its bound parameters.
#[derive(Debug)]
pub struct Match<'a, H> {
    pub handler: &'a H,
    pub template: &'a str,
    pub params: HashMap<String, String>,
}

#[derive(Debug)]
pub struct PathTree<H> {
    root: Node<H>,
    len: usize,
}

impl<H> Default for PathTree<H> {
    fn default() -> Self {
        PathTree {
            root: Node::default(),
            len: 0,
        }
    }
}

fn invalid(template: &str, reason: &str) -> RouteError {
    RouteError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>, RouteError> {
    let rest = template
        .strip_prefix('/')
        .ok_or_else(|| invalid(template, "must start with '/'"))?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let wildcard = Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_]*)\}$").map_err(|e| invalid(template, &e.to_string()))?;

    let mut segments = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for raw in rest.split('/') {
        if raw.is_empty() {
            return Err(invalid(template, "empty segment"));
        }
        if let Some(caps) = wildcard.captures(raw) {
            let name = caps[1].to_string();
            if seen.contains(&name) {
                return Err(RouteError::RepeatedParameter {
                    template: template.to_string(),
                    parameter: name,
                });
            }
            seen.push(name.clone());
            segments.push(Segment::Wildcard(name));
        } else if raw.contains(['{', '}']) {
            return Err(invalid(template, &format!("malformed wildcard '{}'", raw)));
        } else {
            segments.push(Segment::Literal(raw.to_string()));
        }
    }
    Ok(segments)
}

fn split_path(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}

fn find<'a, 'p, H>(node: &'a Node<H>, segs: &[&'p str], values: &mut Vec<&'p str>) -> Option<&'a Route<H>> {
    let Some((&first, rest)) = segs.split_first() else {
        return node.route.as_ref();
    };
    if let Some(child) = node.literals.get(first) {
        if let Some(route) = find(child, rest, values) {
            return Some(route);
        }
    }
    if let Some(child) = &node.wildcard {
        values.push(first);
        if let Some(route) = find(child, rest, values) {
            return Some(route);
        }
        values.pop();
    }
    None
}

fn collect<'a, H>(node: &'a Node<H>, out: &mut Vec<&'a Route<H>>) {
    if let Some(route) = &node.route {
        out.push(route);
    }
    for child in node.literals.values() {
        collect(child, out);
    }
    if let Some(child) = &node.wildcard {
        collect(child, out);
    }
}

fn collect_mut<'a, H>(node: &'a mut Node<H>, out: &mut Vec<&'a mut Route<H>>) {
    if let Some(route) = node.route.as_mut() {
        out.push(route);
    }
    for child in node.literals.values_mut() {
        collect_mut(child, out);
    }
    if let Some(child) = node.wildcard.as_deref_mut() {
        collect_mut(child, out);
    }
}

impl<H: Endpoint> PathTree<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `handler` at `template`. Wildcards share a node per position, so
    /// `/a/{x}` and `/a/{y}` are the same route.
    pub fn add(&mut self, template: &str, handler: H) -> Result<(), RouteError> {
        let segments = parse_template(template)?;
        let names: Vec<String> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Wildcard(n) => Some(n.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        check_parameters(template, &names, &handler)?;

        let mut node = &mut self.root;
        for seg in segments {
            node = match seg {
                Segment::Literal(s) => node.literals.entry(s).or_default(),
                Segment::Wildcard(_) => node.wildcard.get_or_insert_with(Default::default).as_mut(),
            };
        }
        if let Some(existing) = &node.route {
            return Err(RouteError::Duplicate(if existing.template == template {
                template.to_string()
            } else {
                format!("{} (same shape as {})", template, existing.template)
            }));
        }
        node.route = Some(Route {
            template: template.to_string(),
            names,
            handler,
        });
        self.len += 1;
        tracing::debug!(template = %template, "route added");
        Ok(())
    }

    /// Resolve a concrete path. Misses are `RouteError::NotFound`.
    pub fn get(&self, path: &str) -> Result<Match<'_, H>, RouteError> {
        let segments = split_path(path);
        let mut values = Vec::with_capacity(segments.len());
        let route = find(&self.root, &segments, &mut values).ok_or_else(|| RouteError::NotFound(path.to_string()))?;
        let params = route
            .names
            .iter()
            .cloned()
            .zip(values.into_iter().map(str::to_string))
            .collect();
        Ok(Match {
            handler: &route.handler,
            template: &route.template,
            params,
        })
    }

    /// Every registered handler with its positional wildcard names.
    pub fn controllers(&self) -> Vec<(&H, &[String])> {
        let mut routes = Vec::with_capacity(self.len);
        collect(&self.root, &mut routes);
        routes.into_iter().map(|r| (&r.handler, r.names.as_slice())).collect()
    }

    pub fn templates(&self) -> Vec<&str> {
        let mut routes = Vec::with_capacity(self.len);
        collect(&self.root, &mut routes);
        routes.into_iter().map(|r| r.template.as_str()).collect()
    }

    /// Swap every route bound to `old` for `new`. Returns how many were replaced.
    pub fn replace_controller(&mut self, old: &H, new: H) -> Result<usize, RouteError>
    where
        H: Clone,
    {
        let mut routes = Vec::with_capacity(self.len);
        collect_mut(&mut self.root, &mut routes);
        let mut replaced = 0;
        for route in routes.into_iter().filter(|r| r.handler.is_same(old)) {
            check_parameters(&route.template, &route.names, &new)?;
            route.handler = new.clone();
            replaced += 1;
        }
        Ok(replaced)
    }
}

fn check_parameters<H: Endpoint>(template: &str, names: &[String], handler: &H) -> Result<(), RouteError> {
    let accepted = handler.parameters();
    match names.iter().find(|n| !accepted.contains(*n)) {
        Some(missing) => Err(RouteError::MissingParameter {
            template: template.to_string(),
            parameter: missing.clone(),
        }),
        None => Ok(()),
    }
}
