use std::sync::Arc;

use color_eyre::eyre::Context;
use tracing::{debug, info, warn};

use crate::adapters::xml_signature::XmlSignatureValidator;
use crate::config::Config;
use crate::pki::Certificate;
use crate::tsl::{DigestCache, HttpFetcher, RootList, TerritoryRegistry, TslParser, TslService};

/// Read PEM or DER certificate files
pub async fn load_certificates(paths: &[String]) -> color_eyre::Result<Vec<Certificate>> {
    let mut certs = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .wrap_err_with(|| format!("Failed to read certificate {path}"))?;
        let cert = Certificate::from_pem_or_der(&bytes)
            .wrap_err_with(|| format!("Invalid certificate {path}"))?;
        debug!("Loaded certificate {cert} from {path}");
        certs.push(cert);
    }
    Ok(certs)
}

/// Wire the trusted list service from configuration
pub async fn setup(config: &Config) -> color_eyre::Result<TslService> {
    let tsl = &config.tsl;

    let anchors = load_certificates(&tsl.signing_certs).await?;
    if anchors.is_empty() {
        warn!("No root list signing certificates configured, every download will be rejected");
    }

    let fetcher = HttpFetcher::new(&tsl.user_agent).wrap_err("Failed to build HTTP client")?;
    let cache = DigestCache::new(&tsl.cache_dir, Arc::new(fetcher));
    let parser = TslParser::new(cache, Arc::new(XmlSignatureValidator::new()))
        .with_options(tsl.parser_options());

    let registry = Arc::new(TerritoryRegistry::new());
    for territory in &tsl.territories {
        registry.activate(territory);
    }

    let root = RootList {
        url: tsl.url.clone(),
        territory: tsl.territory.trim().to_uppercase(),
        anchors,
    };
    info!(
        "Trusted list service ready: root {} ({}), territories [{}]",
        root.url,
        root.territory,
        registry.active().join(", ")
    );

    Ok(TslService::new(parser, registry, root))
}
