use roost::routes::{Endpoint, PathTree};
use roost::RouteError;

#[derive(Clone, Debug)]
struct Controller {
    name: &'static str,
    params: Vec<String>,
}

impl Controller {
    fn new(name: &'static str, params: &[&str]) -> Self {
        Controller {
            name,
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Endpoint for Controller {
    fn parameters(&self) -> &[String] {
        &self.params
    }

    fn is_same(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[test]
fn binds_named_parameters() {
    let mut tree = PathTree::new();
    tree.add("/a/{x}/b/{y}", Controller::new("ab", &["x", "y"])).unwrap();
    let m = tree.get("/a/1/b/2").unwrap();
    assert_eq!(m.handler.name, "ab");
    assert_eq!(m.template, "/a/{x}/b/{y}");
    assert_eq!(m.params.len(), 2);
    assert_eq!(m.params["x"], "1");
    assert_eq!(m.params["y"], "2");
}

#[test]
fn unknown_paths_are_not_found() {
    let mut tree = PathTree::new();
    tree.add("/a/{x}/b/{y}", Controller::new("ab", &["x", "y"])).unwrap();
    for path in ["/a/1/b", "/a/1/c/2", "/b", "/a/1/b/2/c"] {
        let err = tree.get(path).unwrap_err();
        assert!(err.is_not_found(), "{}", path);
        assert_eq!(err, RouteError::NotFound(path.to_string()));
    }
}

#[test]
fn duplicate_templates_are_rejected() {
    let mut tree = PathTree::new();
    tree.add("/a/{x}/b/{y}", Controller::new("first", &["x", "y"])).unwrap();
    let err = tree
        .add("/a/{x}/b/{y}", Controller::new("second", &["x", "y"]))
        .unwrap_err();
    assert_eq!(err, RouteError::Duplicate("/a/{x}/b/{y}".into()));
    assert_eq!(tree.get("/a/1/b/2").unwrap().handler.name, "first");
}

#[test]
fn handler_must_accept_every_wildcard() {
    let mut tree = PathTree::new();
    let err = tree.add("/a/{x}/b/{y}", Controller::new("ab", &["x"])).unwrap_err();
    assert_eq!(
        err,
        RouteError::MissingParameter {
            template: "/a/{x}/b/{y}".into(),
            parameter: "y".into()
        }
    );
    assert!(tree.is_empty());
}

#[test]
fn literal_and_wildcard_siblings() {
    let mut tree = PathTree::new();
    tree.add("/hotels", Controller::new("list", &[])).unwrap();
    tree.add("/hotels/{id}", Controller::new("one", &["id"])).unwrap();
    tree.add("/hotels/search", Controller::new("search", &[])).unwrap();
    tree.add("/hotels/{hotel_id}/rooms", Controller::new("rooms", &["hotel_id"])).unwrap();

    assert_eq!(tree.get("/hotels").unwrap().handler.name, "list");
    assert_eq!(tree.get("/hotels/search").unwrap().handler.name, "search");
    assert_eq!(tree.get("/hotels/7").unwrap().params["id"], "7");
    // names are per route even though the wildcard node is shared
    assert_eq!(tree.get("/hotels/7/rooms").unwrap().params["hotel_id"], "7");

    let mut listed: Vec<_> = tree
        .controllers()
        .into_iter()
        .map(|(c, names)| (c.name, names.to_vec()))
        .collect();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            ("list", vec![]),
            ("one", vec!["id".to_string()]),
            ("rooms", vec!["hotel_id".to_string()]),
            ("search", vec![]),
        ]
    );
}
