//! Facade crate for the workflow core and its built-in role implementations.
//! Re-exports the domain and kernel, and builds the catalog of every implementation this
//! build carries. Keep this crate thin: it composes role crates, it does not implement any.
//!
//! ## Usage
//! - Enable the role features you need (all by default).
//! - Call [`catalog`] once per process and hand it to a [`kernel::Controller`].

use seis_kernel::{Catalog, ComponentFactory};
use std::sync::Arc;

pub use seis_domain as domain;
pub use seis_kernel as kernel;

/// Role crates compiled into this build.
pub mod features {
    #[cfg(feature = "optimize")]
    pub use seis_optimize as optimize;
    #[cfg(feature = "postprocess")]
    pub use seis_postprocess as postprocess;
    #[cfg(feature = "preprocess")]
    pub use seis_preprocess as preprocess;
    #[cfg(feature = "solver")]
    pub use seis_solver as solver;
    #[cfg(feature = "system")]
    pub use seis_system as system;
    #[cfg(feature = "workflow")]
    pub use seis_workflow as workflow;

    /// Build-time enabled role features (by Cargo feature).
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "system")]
        "system",
        #[cfg(feature = "preprocess")]
        "preprocess",
        #[cfg(feature = "solver")]
        "solver",
        #[cfg(feature = "postprocess")]
        "postprocess",
        #[cfg(feature = "optimize")]
        "optimize",
        #[cfg(feature = "workflow")]
        "workflow",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// Built-in implementations per role feature: `(feature, role, name, type name)`.
const BUILT_IN: &[(&str, domain::Role, &str, &str)] = &[
    ("system", domain::Role::System, "local", "Local"),
    ("preprocess", domain::Role::Preprocess, "default", "Default"),
    ("solver", domain::Role::Solver, "specfem", "Specfem"),
    ("postprocess", domain::Role::Postprocess, "base", "Base"),
    ("optimize", domain::Role::Optimize, "gradient", "Gradient"),
    ("optimize", domain::Role::Optimize, "LBFGS", "LBFGS"),
    ("workflow", domain::Role::Workflow, "basic", "Basic"),
    ("workflow", domain::Role::Workflow, "inversion", "Inversion"),
];

fn missing_reason(feature: &str) -> &'static str {
    match feature {
        "system" => "built without the `system` feature",
        "preprocess" => "built without the `preprocess` feature",
        "solver" => "built without the `solver` feature",
        "postprocess" => "built without the `postprocess` feature",
        "optimize" => "built without the `optimize` feature",
        _ => "built without the `workflow` feature",
    }
}

/// Registers every built-in implementation. Implementations of a disabled feature are
/// registered as unavailable, so configuring one fails with an import error rather than
/// an unknown name.
pub fn register(catalog: &mut Catalog) {
    for &(feature, role, name, type_name) in BUILT_IN {
        if !features::is_enabled(feature) {
            catalog.register_factory(ComponentFactory::unavailable(role, name, type_name, missing_reason(feature)));
        }
    }

    #[cfg(feature = "system")]
    seis_system::register(catalog);
    #[cfg(feature = "preprocess")]
    seis_preprocess::register(catalog);
    #[cfg(feature = "solver")]
    seis_solver::register(catalog);
    #[cfg(feature = "postprocess")]
    seis_postprocess::register(catalog);
    #[cfg(feature = "optimize")]
    seis_optimize::register(catalog);
    #[cfg(feature = "workflow")]
    seis_workflow::register(catalog);
}

/// The process-wide catalog of built-in implementations.
#[must_use]
pub fn catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    register(&mut catalog);
    Arc::new(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Role;

    #[test]
    fn every_built_in_is_registered() {
        let catalog = catalog();
        for &(_, role, _, type_name) in BUILT_IN {
            let factory = catalog.lookup(role, type_name).unwrap();
            assert_eq!(factory.role(), role);
        }
        assert_eq!(catalog.implementations(Role::Optimize), ["LBFGS", "gradient"]);
    }

    #[cfg(feature = "full")]
    #[test]
    fn full_build_has_no_placeholders() {
        let catalog = catalog();
        assert!(BUILT_IN.iter().all(|&(_, role, _, type_name)| {
            catalog.lookup(role, type_name).is_some_and(|f| f.ensure_available().is_ok())
        }));
        assert_eq!(features::ENABLED.len(), 6);
    }
}
