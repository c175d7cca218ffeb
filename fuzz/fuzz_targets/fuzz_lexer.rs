#![no_main]

use jsbridge::lexer::{Lexer, TokenKind};
use jsbridge::string_dict::StringDict;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 100_000 {
        return;
    }

    let mut dict = StringDict::new();
    let mut lexer = Lexer::new(source, &mut dict);

    // Spans stay inside the source; the token count bound catches a lexer
    // that stops advancing
    for _ in 0..=source.len() + 1 {
        let token = lexer.next_token();
        assert!(token.span.start <= token.span.end);
        assert!(token.span.end <= source.len());
        if matches!(token.kind, TokenKind::Eof) {
            return;
        }
    }
    panic!("lexer did not reach end of input");
});
