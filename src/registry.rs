//! Checker declarations, compilation, and the per-version registry.
//!
//! A checker is one function bound to one tree pattern plus a declared set
//! of context requests. The registry compiles every applicable declaration
//! up front (fail fast on a bad pattern) and is immutable afterwards, so
//! any number of dispatch runs can share it read-only.

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use semver::{Version, VersionReq};
use thiserror::Error;

use crate::diagnostic::ErrorSpec;
use crate::grammar::{FeatureSet, Grammar};
use crate::pattern::{Captures, PatternCompiler, PatternError, PatternShape, TreePattern};
use crate::source::{Anchor, Comment};
use crate::tree::{NodeId, SyntaxTree};

/// Extra context a checker asks the dispatcher to assemble before it is
/// invoked. Declared per checker at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRequest {
    /// Comment tokens recovered from the named capture's leading prefix,
    /// delivered under that capture's name.
    CommentsFor(String),
    /// The name of the file being checked.
    Filename,
    /// The feature set detected for this run.
    Features,
    /// The (feature-adjusted) grammar driving this run.
    Grammar,
}

/// One result yielded by a checker: the node to report at, the error
/// descriptor, an addressing anchor, and the message template fields.
#[derive(Debug, Clone)]
pub struct Finding {
    pub node: NodeId,
    pub error: ErrorSpec,
    pub anchor: Anchor,
    pub fields: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(node: NodeId, error: ErrorSpec) -> Self {
        Self {
            node,
            error,
            anchor: Anchor::default(),
            fields: BTreeMap::new(),
        }
    }

    pub fn at(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Context assembled per (node, checker) pair. Optional handles are
/// populated only for the requests the checker declared; the whole record
/// is dropped as soon as the checker returns.
pub struct CheckContext<'a, G> {
    pub tree: &'a SyntaxTree,
    /// The node the pattern matched.
    pub node: NodeId,
    pub captures: &'a Captures,
    /// Capture name to comment tokens, present only for requested
    /// captures.
    pub comments: &'a BTreeMap<String, Vec<Comment>>,
    pub filename: Option<&'a str>,
    pub features: Option<&'a FeatureSet>,
    pub grammar: Option<&'a G>,
}

/// Checkers return a finite batch of findings, or fail the file.
pub type CheckerResult = Result<Vec<Finding>, Box<dyn StdError + Send + Sync>>;

pub type CheckerFn<G> = Box<dyn Fn(&CheckContext<'_, G>) -> CheckerResult + Send + Sync>;

/// A checker declaration, before pattern compilation.
pub struct CheckerSpec<G> {
    pattern: String,
    requests: Vec<ContextRequest>,
    version_req: Option<String>,
    run: CheckerFn<G>,
}

impl<G: Grammar> CheckerSpec<G> {
    pub fn new<F>(pattern: impl Into<String>, run: F) -> Self
    where
        F: Fn(&CheckContext<'_, G>) -> CheckerResult + Send + Sync + 'static,
    {
        Self {
            pattern: pattern.into(),
            requests: Vec::new(),
            version_req: None,
            run: Box::new(run),
        }
    }

    pub fn request(mut self, request: ContextRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Restrict this checker to grammar versions matching a semver
    /// requirement, e.g. `">=3.5"` or `">=3.0, <3.8"`. A checker whose
    /// requirement excludes the active version is skipped silently at
    /// build time.
    pub fn for_versions(mut self, requirement: impl Into<String>) -> Self {
        self.version_req = Some(requirement.into());
        self
    }
}

/// A compiled checker entry: immutable after registry construction.
pub(crate) struct CompiledChecker<G> {
    pub(crate) pattern_text: String,
    pub(crate) matcher: Box<dyn TreePattern + Send + Sync>,
    pub(crate) shape: PatternShape,
    pub(crate) requests: Vec<ContextRequest>,
    pub(crate) run: CheckerFn<G>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("invalid version requirement `{value}`: {message}")]
    InvalidRequirement { value: String, message: String },
}

/// The compiled checker set for one grammar version.
pub struct Registry<G> {
    version: Version,
    checkers: Vec<CompiledChecker<G>>,
}

impl<G: Grammar> Registry<G> {
    /// Compile `specs` against `grammar`. Version-inapplicable checkers
    /// are skipped (not an error); a pattern or requirement that fails to
    /// parse aborts construction.
    pub fn build<C>(grammar: &G, compiler: &C, specs: Vec<CheckerSpec<G>>) -> Result<Self, RegistryError>
    where
        C: PatternCompiler<G>,
    {
        let mut checkers = Vec::new();
        let mut skipped = 0usize;
        for spec in specs {
            if let Some(requirement) = &spec.version_req {
                let parsed = VersionReq::parse(requirement).map_err(|e| {
                    RegistryError::InvalidRequirement {
                        value: requirement.clone(),
                        message: e.to_string(),
                    }
                })?;
                if !parsed.matches(grammar.version()) {
                    skipped += 1;
                    continue;
                }
            }
            let compiled = compiler.compile(grammar, &spec.pattern)?;
            checkers.push(CompiledChecker {
                pattern_text: spec.pattern,
                matcher: compiled.matcher,
                shape: compiled.shape,
                requests: spec.requests,
                run: spec.run,
            });
        }
        debug!(
            "registry for {}: {} checkers compiled, {} skipped by version",
            grammar.version(),
            checkers.len(),
            skipped
        );
        Ok(Self {
            version: grammar.version().clone(),
            checkers,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    pub(crate) fn checkers(&self) -> &[CompiledChecker<G>] {
        &self.checkers
    }
}

/// Process-wide registry cache keyed by grammar version: populated on
/// first use, immutable thereafter, shared read-only by every dispatch
/// run. Repeated checks across a batch of files amortize pattern
/// compilation this way.
pub struct RegistryCache<G> {
    built: Mutex<HashMap<String, Arc<Registry<G>>>>,
}

impl<G: Grammar> RegistryCache<G> {
    pub fn new() -> Self {
        Self {
            built: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the registry for `key`, building it on first use.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Result<Arc<Registry<G>>, RegistryError>
    where
        F: FnOnce() -> Result<Registry<G>, RegistryError>,
    {
        let mut built = self.built.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(registry) = built.get(key) {
            return Ok(Arc::clone(registry));
        }
        let registry = Arc::new(build()?);
        built.insert(key.to_string(), Arc::clone(&registry));
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<G: Grammar> Default for RegistryCache<G> {
    fn default() -> Self {
        Self::new()
    }
}
