use vitrine::{StageConfig, Variant};

/// Press `L` to add another ring of copies.
fn main() -> anyhow::Result<()> {
    vitrine::run(StageConfig::default().with_variant(Variant::Carousel))
}
