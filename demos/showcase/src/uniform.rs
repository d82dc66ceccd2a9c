use vitrine::{StageConfig, Variant};

fn main() -> anyhow::Result<()> {
    vitrine::run(StageConfig::default().with_variant(Variant::Uniform))
}
