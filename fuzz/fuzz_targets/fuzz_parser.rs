#![no_main]

use jsbridge::parser::Parser;
use jsbridge::string_dict::StringDict;
use jsbridge::{Context, ContextConfig, NoOpConsoleProvider};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 100_000 {
        return;
    }

    let mut dict = StringDict::new();
    let parsed = Parser::new(source, &mut dict).parse_program().is_ok();

    // A parse failure must surface from eval as a guest SyntaxError
    if !parsed {
        let ctx = Context::builder()
            .config(ContextConfig::default().with_max_operations(1))
            .console(NoOpConsoleProvider)
            .build();
        let err = ctx.eval(source).err();
        assert!(err.is_some_and(|err| err.to_string().starts_with("SyntaxError")));
    }
});
