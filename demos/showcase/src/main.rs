use vitrine::StageConfig;

fn main() -> anyhow::Result<()> {
    vitrine::run(StageConfig::default())
}
