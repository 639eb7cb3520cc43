pub mod build;
pub mod error;
pub mod graph;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod tls_material;

pub use error::ConfigError;
pub use model::Document;
pub use pipeline::Pipeline;

use std::path::Path;

/// Reads, merges and builds a complete, runnable [`Pipeline`] from one or
/// more TOML configuration files. This is the single entry point a binary
/// needs: parse errors, unknown references and dependency cycles are all
/// reported here, before any listener binds (§6).
pub async fn load(paths: &[impl AsRef<Path>]) -> Result<Pipeline, ConfigError> {
    let document = load::load_documents(paths)?;
    pipeline::build_pipeline(&document).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_reference_is_reported() {
        let dir = std::env::temp_dir().join(format!("routedns-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("unknown.toml");
        std::fs::write(
            &path,
            r#"
            [routers.main]
            routes = []
            default = "does-not-exist"

            [listeners.main]
            kind = "udp"
            address = "127.0.0.1:0"
            resolver = "main"
            "#,
        )
        .unwrap();

        let err = load(&[&path]).await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownReference { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn cycle_between_resolvers_is_reported() {
        let dir = std::env::temp_dir().join(format!("routedns-config-test-cycle-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cycle.toml");
        std::fs::write(
            &path,
            r#"
            [resolvers.a]
            kind = "ttl-clamp"
            resolver = "b"

            [resolvers.b]
            kind = "ttl-clamp"
            resolver = "a"

            [listeners.main]
            kind = "udp"
            address = "127.0.0.1:0"
            resolver = "a"
            "#,
        )
        .unwrap();

        let err = load(&[&path]).await.unwrap_err();
        assert!(matches!(err, ConfigError::Cycle(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn duplicate_id_across_tables_is_rejected() {
        let mut doc = Document::default();
        doc.resolvers.insert(
            "shared".to_string(),
            model::ResolverSpec::Drop(model::SingleIdSpec { resolver: None }),
        );
        doc.groups.insert(
            "shared".to_string(),
            model::GroupSpec::RoundRobin { resolvers: vec![] },
        );
        match graph::Builder::new(&doc) {
            Err(ConfigError::DuplicateId(id)) => assert_eq!(id, "shared"),
            Err(other) => panic!("expected DuplicateId, got {other:?}"),
            Ok(_) => panic!("expected a DuplicateId error"),
        }
    }

    #[test]
    fn merge_lets_later_file_win() {
        let mut base = Document::default();
        base.resolvers.insert(
            "r".to_string(),
            model::ResolverSpec::Drop(model::SingleIdSpec { resolver: None }),
        );
        let mut overlay = Document::default();
        overlay.resolvers.insert(
            "r".to_string(),
            model::ResolverSpec::Truncate(model::SingleIdSpec { resolver: None }),
        );
        base.merge(overlay);
        assert!(matches!(base.resolvers.get("r"), Some(model::ResolverSpec::Truncate(_))));
    }
}
