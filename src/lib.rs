pub mod artifacts;
pub mod batch;
pub mod cleanup;
pub mod credentials;
pub mod github;
pub mod importer;
pub mod mapping;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod snyk;
