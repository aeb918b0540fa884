use pod_types::SiteKey;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("cycle detected among macro sites: {}", render_path(.0))]
    CycleDetected(Vec<SiteKey>),

    #[error("macro site `{0}` was referenced as a dependency but never discovered")]
    UnknownSite(SiteKey),
}

fn render_path(path: &[SiteKey]) -> String {
    path.iter()
        .map(SiteKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
