//! Console output through a buffered provider

use jsbridge::{BufferedConsoleProvider, ConsoleLevel, Context};

fn context_with_buffer() -> (Context, BufferedConsoleProvider) {
    let buffer = BufferedConsoleProvider::new();
    let ctx = Context::builder().console(buffer.clone()).build();
    (ctx, buffer)
}

#[test]
fn test_levels_are_routed() {
    let (ctx, buffer) = context_with_buffer();
    let result = ctx.eval("console.log('a', 1); console.warn('careful'); console.error('bad')");
    assert!(result.is_ok());
    assert_eq!(
        buffer.lines(),
        vec![
            (ConsoleLevel::Log, "a 1".to_string()),
            (ConsoleLevel::Warn, "careful".to_string()),
            (ConsoleLevel::Error, "bad".to_string()),
        ]
    );
}

#[test]
fn test_objects_print_as_json() {
    let (ctx, buffer) = context_with_buffer();
    assert!(ctx.eval("console.info({ a: [1, 'x'] })").is_ok());
    assert_eq!(buffer.messages(), vec![r#"{"a":[1,"x"]}"#.to_string()]);
}

#[test]
fn test_errors_print_name_and_message() {
    let (ctx, buffer) = context_with_buffer();
    assert!(ctx.eval("console.debug(new RangeError('out'))").is_ok());
    assert_eq!(buffer.messages(), vec!["RangeError: out".to_string()]);
}

#[test]
fn test_take_drains() {
    let (ctx, buffer) = context_with_buffer();
    assert!(ctx.eval("console.log('once')").is_ok());
    assert_eq!(buffer.take().len(), 1);
    assert!(buffer.lines().is_empty());
}

#[test]
fn test_clear_empties_buffer() {
    let (ctx, buffer) = context_with_buffer();
    assert!(ctx.eval("console.log('gone'); console.clear(); console.log('kept')").is_ok());
    assert_eq!(buffer.messages(), vec!["kept".to_string()]);
}
