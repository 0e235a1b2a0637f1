use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let code = stopgate::run().context("stopgate failed")?;
    std::process::exit(code);
}
