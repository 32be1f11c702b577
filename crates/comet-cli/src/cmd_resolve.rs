use anyhow::Result;
use comet::v1::{ActionName, resolve};

pub fn run(
    action: String,
    index: usize,
    indices: Vec<usize>,
    len_current: usize,
    len_prior: usize,
    pretty: bool,
) -> Result<()> {
    let name = ActionName::from(action);
    let candidates = resolve(&name, index, &indices, len_current, len_prior)?;
    tracing::debug!(action = %name, ?candidates, "resolved candidate indices");
    println!("{}", crate::to_json(&candidates, pretty)?);
    Ok(())
}
