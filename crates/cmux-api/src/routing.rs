//! # Tenant Routing
//!
//! Splits a request path into a repository namespace and a route within
//! it. The first `depth` non-empty segments are the namespace; the rest is
//! matched against a fixed set of shapes:
//!
//! | Method     | Remainder                                     | Route                  |
//! |------------|-----------------------------------------------|------------------------|
//! | GET, HEAD  | (empty)                                       | `Welcome`              |
//! | GET, HEAD  | `index.yaml`                                  | `GetIndex`             |
//! | GET, HEAD  | `charts/{filename}`                           | `GetArtifact`          |
//! | GET        | `api/charts`                                  | `ListCharts`           |
//! | GET        | `api/charts/{name}`                           | `GetChart`             |
//! | GET        | `api/charts/{name}/{version}`                 | `GetChartVersion`      |
//! | POST, PUT  | `charts`, `api/charts`                        | `UploadChart`          |
//! | POST, PUT  | `prov`, `api/prov`                            | `UploadProvenance`     |
//! | DELETE     | `charts/{n}/{v}`, `api/charts/{n}/{v}`        | `DeleteChartVersion`   |
//!
//! Resolution does no I/O. Whether the namespace holds anything is only
//! known once the index cache is consulted.
//!
//! The bare server root `/` has no segments at all and resolves to the
//! root repository's landing page at every depth. Any other path with fewer
//! than `depth` segments is [`RouteError::NamespaceAmbiguous`].

use axum::http::Method;
use cmux_core::{validate_segment, Depth, RepositoryId};
use thiserror::Error;

/// What a request asks for within its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Landing page.
    Welcome,
    /// `index.yaml`.
    GetIndex,
    /// A stored archive or provenance file.
    GetArtifact {
        /// Requested filename, extension not yet classified.
        filename: String,
    },
    /// Every chart in the index, as JSON.
    ListCharts,
    /// All versions of one chart, as JSON.
    GetChart {
        /// Chart name.
        name: String,
    },
    /// One chart version, as JSON.
    GetChartVersion {
        /// Chart name.
        name: String,
        /// Chart version.
        version: String,
    },
    /// Upload an archive, optionally with its provenance file.
    UploadChart,
    /// Upload a provenance file on its own.
    UploadProvenance,
    /// Delete a chart version.
    DeleteChartVersion {
        /// Chart name.
        name: String,
        /// Chart version.
        version: String,
    },
}

impl Route {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::GetIndex => "get_index",
            Self::GetArtifact { .. } => "get_artifact",
            Self::ListCharts => "list_charts",
            Self::GetChart { .. } => "get_chart",
            Self::GetChartVersion { .. } => "get_chart_version",
            Self::UploadChart => "upload_chart",
            Self::UploadProvenance => "upload_provenance",
            Self::DeleteChartVersion { .. } => "delete_chart_version",
        }
    }
}

/// A route bound to the repository it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Repository named by the leading segments.
    pub repo: RepositoryId,
    /// Route within the repository.
    pub route: Route,
}

/// Why a path could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The path has fewer segments than the configured depth.
    #[error("path {path:?} has {actual} segment(s); repositories are {expected} segment(s) deep")]
    NamespaceAmbiguous {
        /// Request path.
        path: String,
        /// Configured depth.
        expected: usize,
        /// Segments present.
        actual: usize,
    },

    /// A namespace or file segment is `.` or `..`.
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),

    /// The remainder matches no route shape.
    #[error("no route for {0}")]
    UnknownRoute(String),

    /// The remainder matches a route shape, but not for this method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },
}

/// Depth-parameterized path resolver. One per server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    depth: Depth,
}

impl Resolver {
    /// Create a resolver for repositories `depth` segments deep.
    pub fn new(depth: Depth) -> Self {
        Self { depth }
    }

    /// Configured depth.
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Resolve `path` for `method`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<ResolvedRoute, RouteError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return match classify(method, &[]) {
                Some(Ok(route)) => Ok(ResolvedRoute {
                    repo: RepositoryId::root(),
                    route,
                }),
                _ => Err(RouteError::MethodNotAllowed {
                    method: method.clone(),
                    path: path.to_string(),
                }),
            };
        }

        let depth = self.depth.get();
        if segments.len() < depth {
            return Err(RouteError::NamespaceAmbiguous {
                path: path.to_string(),
                expected: depth,
                actual: segments.len(),
            });
        }

        let (namespace, rest) = segments.split_at(depth);
        let repo = RepositoryId::from_segments(namespace).map_err(|_| invalid_segment(namespace))?;

        match classify(method, rest) {
            Some(Ok(route)) => {
                check_route_segments(&route)?;
                Ok(ResolvedRoute { repo, route })
            }
            Some(Err(())) => Err(RouteError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            }),
            None => Err(RouteError::UnknownRoute(path.to_string())),
        }
    }
}

/// `None` for an unknown shape, `Some(Err)` for a known shape with the
/// wrong method.
fn classify(method: &Method, rest: &[&str]) -> Option<Result<Route, ()>> {
    let read = *method == Method::GET || *method == Method::HEAD;
    let get = *method == Method::GET;
    let write = *method == Method::POST || *method == Method::PUT;
    let delete = *method == Method::DELETE;

    let route = match rest {
        [] if read => Route::Welcome,
        ["index.yaml"] if read => Route::GetIndex,
        ["charts", filename] if read => Route::GetArtifact {
            filename: filename.to_string(),
        },
        ["charts"] | ["api", "charts"] if write => Route::UploadChart,
        ["prov"] | ["api", "prov"] if write => Route::UploadProvenance,
        ["api", "charts"] if get => Route::ListCharts,
        ["api", "charts", name] if get => Route::GetChart {
            name: name.to_string(),
        },
        ["api", "charts", name, version] if get => Route::GetChartVersion {
            name: name.to_string(),
            version: version.to_string(),
        },
        ["charts", name, version] | ["api", "charts", name, version] if delete => {
            Route::DeleteChartVersion {
                name: name.to_string(),
                version: version.to_string(),
            }
        }
        []
        | ["index.yaml"]
        | ["charts"]
        | ["charts", _]
        | ["charts", _, _]
        | ["prov"]
        | ["api", "prov"]
        | ["api", "charts"]
        | ["api", "charts", _]
        | ["api", "charts", _, _] => return Some(Err(())),
        _ => return None,
    };
    Some(Ok(route))
}

fn check_route_segments(route: &Route) -> Result<(), RouteError> {
    let segments: Vec<&str> = match route {
        Route::GetArtifact { filename } => vec![filename.as_str()],
        Route::GetChart { name } => vec![name.as_str()],
        Route::GetChartVersion { name, version } | Route::DeleteChartVersion { name, version } => {
            vec![name.as_str(), version.as_str()]
        }
        _ => Vec::new(),
    };
    for segment in segments {
        validate_segment(segment).map_err(|_| RouteError::InvalidSegment(segment.to_string()))?;
    }
    Ok(())
}

fn invalid_segment(namespace: &[&str]) -> RouteError {
    let bad = namespace
        .iter()
        .find(|s| validate_segment(s).is_err())
        .copied()
        .unwrap_or_default();
    RouteError::InvalidSegment(bad.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver(depth: u8) -> Resolver {
        Resolver::new(Depth::new(depth))
    }

    fn get(depth: u8, path: &str) -> Result<ResolvedRoute, RouteError> {
        resolver(depth).resolve(&Method::GET, path)
    }

    #[test]
    fn depth_zero_routes() {
        let r = get(0, "/index.yaml").unwrap();
        assert!(r.repo.is_root());
        assert_eq!(r.route, Route::GetIndex);

        let r = get(0, "/charts/mychart-0.1.0.tgz").unwrap();
        assert_eq!(
            r.route,
            Route::GetArtifact {
                filename: "mychart-0.1.0.tgz".to_string()
            }
        );
    }

    #[test]
    fn depth_three_routes() {
        let r = get(3, "/org1/team1/repo1/charts/mychart-0.1.0.tgz.prov").unwrap();
        assert_eq!(r.repo.as_str(), "org1/team1/repo1");
        assert_eq!(
            r.route,
            Route::GetArtifact {
                filename: "mychart-0.1.0.tgz.prov".to_string()
            }
        );

        let r = get(3, "/org1/team1/repo1/").unwrap();
        assert_eq!(r.route, Route::Welcome);
        assert_eq!(r.repo.as_str(), "org1/team1/repo1");
    }

    #[test]
    fn bare_root_is_welcome_at_every_depth() {
        for depth in 0..=3 {
            let r = get(depth, "/").unwrap();
            assert_eq!(r.route, Route::Welcome);
            assert!(r.repo.is_root());
        }
    }

    #[test]
    fn short_path_is_ambiguous() {
        let err = get(3, "/org1/team1").unwrap_err();
        assert_eq!(
            err,
            RouteError::NamespaceAmbiguous {
                path: "/org1/team1".to_string(),
                expected: 3,
                actual: 2,
            }
        );
        assert!(matches!(
            get(2, "/index.yaml"),
            Err(RouteError::NamespaceAmbiguous { .. })
        ));
    }

    #[test]
    fn dot_segments_rejected() {
        assert_eq!(
            get(2, "/org1/../index.yaml").unwrap_err(),
            RouteError::InvalidSegment("..".to_string())
        );
        assert_eq!(
            get(1, "/org1/charts/..").unwrap_err(),
            RouteError::InvalidSegment("..".to_string())
        );
        assert_eq!(
            resolver(0)
                .resolve(&Method::DELETE, "/charts/./1.0.0")
                .unwrap_err(),
            RouteError::InvalidSegment(".".to_string())
        );
    }

    #[test]
    fn unknown_shapes_are_not_found() {
        assert!(matches!(
            get(1, "/org1/nothing/here"),
            Err(RouteError::UnknownRoute(_))
        ));
        assert!(matches!(
            get(0, "/charts/a/b/c"),
            Err(RouteError::UnknownRoute(_))
        ));
    }

    #[test]
    fn wrong_method_is_distinct_from_unknown_shape() {
        let r = resolver(1);
        assert!(matches!(
            r.resolve(&Method::DELETE, "/org1/index.yaml"),
            Err(RouteError::MethodNotAllowed { .. })
        ));
        assert!(matches!(
            r.resolve(&Method::GET, "/org1/prov"),
            Err(RouteError::MethodNotAllowed { .. })
        ));
        assert!(matches!(
            r.resolve(&Method::POST, "/org1/charts/a-1.0.0.tgz"),
            Err(RouteError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn mutation_routes() {
        let r = resolver(2);
        for path in ["/org1/team1/charts", "/org1/team1/api/charts"] {
            for method in [Method::POST, Method::PUT] {
                let resolved = r.resolve(&method, path).unwrap();
                assert_eq!(resolved.route, Route::UploadChart);
                assert_eq!(resolved.repo.as_str(), "org1/team1");
            }
        }
        assert_eq!(
            r.resolve(&Method::POST, "/org1/team1/api/prov").unwrap().route,
            Route::UploadProvenance
        );
        for path in [
            "/org1/team1/charts/mychart/0.1.0",
            "/org1/team1/api/charts/mychart/0.1.0",
        ] {
            assert_eq!(
                r.resolve(&Method::DELETE, path).unwrap().route,
                Route::DeleteChartVersion {
                    name: "mychart".to_string(),
                    version: "0.1.0".to_string()
                }
            );
        }
    }

    #[test]
    fn json_api_routes() {
        assert_eq!(get(1, "/org1/api/charts").unwrap().route, Route::ListCharts);
        assert_eq!(
            get(1, "/org1/api/charts/mychart").unwrap().route,
            Route::GetChart {
                name: "mychart".to_string()
            }
        );
        assert_eq!(
            get(1, "/org1/api/charts/mychart/0.1.0").unwrap().route,
            Route::GetChartVersion {
                name: "mychart".to_string(),
                version: "0.1.0".to_string()
            }
        );
    }

    #[test]
    fn namespace_segments_may_shadow_route_words() {
        let r = get(2, "/charts/index.yaml/index.yaml").unwrap();
        assert_eq!(r.repo.as_str(), "charts/index.yaml");
        assert_eq!(r.route, Route::GetIndex);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,8}"
    }

    proptest! {
        #[test]
        fn shared_prefix_resolves_to_same_repository(
            depth in 0u8..=3,
            ns in proptest::collection::vec(segment(), 3),
            filename in "[a-z]{1,8}-[0-9]\\.[0-9]\\.[0-9]\\.tgz",
        ) {
            let prefix = ns[..depth as usize].join("/");
            let r = resolver(depth);
            let index = r.resolve(&Method::GET, &format!("/{prefix}/index.yaml")).unwrap();
            let artifact = r
                .resolve(&Method::GET, &format!("/{prefix}/charts/{filename}"))
                .unwrap();
            prop_assert_eq!(&index.repo, &artifact.repo);
            prop_assert_eq!(index.repo.as_str(), prefix.as_str());
            prop_assert_eq!(artifact.route, Route::GetArtifact { filename });
        }

        #[test]
        fn differing_prefix_resolves_to_different_repositories(
            depth in 1u8..=3,
            a in proptest::collection::vec(segment(), 3),
            b in proptest::collection::vec(segment(), 3),
        ) {
            let d = depth as usize;
            prop_assume!(a[..d] != b[..d]);
            let r = resolver(depth);
            let ra = r.resolve(&Method::GET, &format!("/{}/index.yaml", a[..d].join("/"))).unwrap();
            let rb = r.resolve(&Method::GET, &format!("/{}/index.yaml", b[..d].join("/"))).unwrap();
            prop_assert_ne!(ra.repo, rb.repo);
        }

        #[test]
        fn too_few_segments_is_ambiguous(
            depth in 2u8..=3,
            ns in proptest::collection::vec(segment(), 1..3),
        ) {
            prop_assume!(ns.len() < depth as usize);
            let path = format!("/{}", ns.join("/"));
            let is_ambiguous = matches!(
                resolver(depth).resolve(&Method::GET, &path),
                Err(RouteError::NamespaceAmbiguous { .. })
            );
            prop_assert!(is_ambiguous);
        }
    }
}
