#![no_main]

use jsbridge::{Context, ContextConfig, HostFunction, NoOpConsoleProvider, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Evaluation is more expensive per byte than parsing
    if source.len() > 10_000 {
        return;
    }

    let ctx = Context::builder()
        .config(
            ContextConfig::default()
                .with_timeout_ms(1_000)
                .with_max_operations(100_000)
                .with_max_call_depth(32),
        )
        .console(NoOpConsoleProvider)
        .build();

    // Give guest code a host callable to cross the boundary with
    let _ = ctx.expose(HostFunction::new("host", |_, args| {
        Ok(args.first().cloned().unwrap_or(Value::Undefined))
    }));

    // Errors and terminations are expected, panics are not
    if let Ok(value) = ctx.eval(source) {
        let _ = value.to_json();
    }
    ctx.close();
});
