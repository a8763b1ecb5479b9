use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tacfg::{
    cfg::{build_graph, dot::to_dot},
    error::Result,
    parser::parse,
};

pub fn run_test(source: &str) -> Result<String> {
    let functions = parse(source)?;

    let mut output = String::new();
    for function in &functions {
        let graph = build_graph(function)?;
        output.push_str(&to_dot(&graph));
    }

    Ok(output)
}

#[allow(dead_code)]
pub fn run_passing_test(file: &str) {
    let source = std::fs::read_to_string(file).unwrap();
    let expected = std::fs::read_to_string(PathBuf::from(file).with_extension("dot")).unwrap();

    let output = run_test(&source).unwrap();
    assert_eq!(output.trim(), expected.trim());
}

#[allow(dead_code)]
pub fn run_failing_test(file: &str) {
    let source = std::fs::read_to_string(file).unwrap();

    let expected = source
        .lines()
        .find(|x| x.starts_with("// Expected: "))
        .map(|x| x.replace("// Expected: ", ""));

    let result = run_test(&source);
    assert!(result.is_err());

    if let Some(expected) = expected {
        assert_eq!(result.unwrap_err().message.trim(), expected.trim());
    }
}
