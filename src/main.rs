use redikv::server::bootstrap;
use redikv::server::config::Config;

fn main() -> anyhow::Result<()> {
    bootstrap::run(Config::new())
}
