//! jq preprocessing of input documents via jaq. Each filter output is parsed
//! back into a `serde_json::Value` so callers work with documents, not text.

use anyhow::{anyhow, Result};
use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

pub fn apply_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(|errs| {
        let mut msg = String::from("jq parse error:");
        for (file, err) in errs {
            msg.push_str(&format!(" {err:?} in `{}`", file.code));
        }
        anyhow!(msg)
    })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| {
            let mut msg = String::from("jq compile error:");
            for (file, list) in errs {
                for (name, undef) in list {
                    msg.push_str(&format!(" undefined `{name}` ({undef:?}) in `{}`", file.code));
                }
            }
            anyhow!(msg)
        })?;

    let inputs = RcIter::new(core::iter::empty());
    let mut out = Vec::new();
    for item in filter.run((Ctx::new([], &inputs), Val::from(input.clone()))) {
        let val = item.map_err(|e| anyhow!("jq runtime error: {e:?}"))?;
        let text = format!("{val}"); // Val: Display -> JSON text
        out.push(serde_json::from_str(&text)?);
    }
    Ok(out)
}
