//! Tests for command extraction and the query helpers.

use super::*;

fn first(script: &str) -> Command {
    parse(script).unwrap().commands.remove(0)
}

#[test]
fn test_combined_short_flags_share_id() {
    let cmd = first("tar -xzf archive.tgz -C /opt");
    assert_eq!(cmd.name, "tar");
    assert_eq!(
        cmd.flags,
        vec![Token::new("x", 0), Token::new("z", 0), Token::new("f", 0), Token::new("C", 2)]
    );
    assert_eq!(cmd.flag_values("f"), vec!["archive.tgz"]);
    assert_eq!(cmd.flag_values("C"), vec!["/opt"]);
}

#[test]
fn test_long_flag_with_value() {
    let cmd = first("apt-get -o Dir::Cache=x --target=/var/lib/apt install curl");
    assert!(cmd.has_flag("target"));
    assert!(cmd.has_flag("o"));
    assert_eq!(cmd.flag_values("target"), vec!["/var/lib/apt"]);
    assert_eq!(cmd.flag_values("o"), vec!["Dir::Cache=x"]);
}

#[test]
fn test_dash_and_double_dash_are_not_flags() {
    let cmd = first("cat - -- -n");
    assert_eq!(cmd.flags, vec![Token::new("n", 2)]);
    assert_eq!(cmd.positional_args(), vec!["-", "--"]);
}

#[test]
fn test_flags_correlate_with_arguments() {
    let cmd = first("pip install --no-cache-dir -r requirements.txt -U flask==2.0");
    for flag in &cmd.flags {
        let argument = &cmd.arguments[flag.id];
        assert!(argument.text.starts_with('-'), "{:?} does not point at a flag", flag);
    }
}

#[test]
fn test_positional_args_are_ids_absent_from_flags() {
    let cmd = first("pip install --no-cache-dir -r requirements.txt -U flask==2.0");
    let flag_ids: HashSet<usize> = cmd.flags.iter().map(|t| t.id).collect();
    let expected: Vec<&str> = cmd
        .arguments
        .iter()
        .filter(|t| !flag_ids.contains(&t.id))
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(cmd.positional_args(), expected);
    assert_eq!(cmd.positional_args(), vec!["install", "requirements.txt", "flask==2.0"]);
    assert_eq!(cmd.args_skipping_flag_values(&["r"]), vec!["install", "flask==2.0"]);
}

#[test]
fn test_args_after_subcommand() {
    let cmd = first("apt-get -y -o Debug=1 install --no-install-recommends curl wget");
    assert_eq!(cmd.args_after("install", &["o"]), vec!["curl", "wget"]);
    assert!(cmd.args_after("remove", &[]).is_empty());
}

#[test]
fn test_has_subcommand() {
    assert!(first("npm --silent install express").has_subcommand(&["install", "i"]));
    assert!(!first("npm run build").has_subcommand(&["install", "i"]));
}

#[test]
fn test_count_flag_in_combined_flags() {
    let cmd = first("apt-get -qq install curl");
    assert_eq!(cmd.count_flag("q"), 2);
}

#[test]
fn test_pipeline_and_chain_yield_separate_commands() {
    let parsed = parse("apt-get update && apt-get install -y curl | tee log; rm -rf x").unwrap();
    let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["apt-get", "apt-get", "tee", "rm"]);
    assert_eq!(parsed.command_count(), 4);
    assert_eq!(parsed.commands_named("apt-get").count(), 2);
    assert!(parsed.using_program("tee"));
    assert!(!parsed.using_program("curl"));
    assert!(parsed.has_pipes());
}

#[test]
fn test_nested_commands_are_extracted() {
    let parsed = parse("if true; then echo $(wget -q -O- url); fi").unwrap();
    let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["true", "echo", "wget"]);
}

#[test]
fn test_expansions_collapse_to_placeholder() {
    let cmd = first(r#"apt-get install "curl=${CURL_VERSION}" 'lit$eral' "$(cat v)" $((1+1)) x$HOME"#);
    assert_eq!(
        cmd.positional_args(),
        vec!["install", "curl=${VAR}", "lit$eral", "${VAR}", "${VAR}", "x${VAR}"]
    );
}

#[test]
fn test_assignment_only_commands_are_skipped() {
    let parsed = parse("FOO=bar; BAR=baz env").unwrap();
    let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["env"]);
}

#[test]
fn test_has_any_arg_and_flag() {
    let cmd = first("apk add --no-cache curl");
    assert!(cmd.is("apk"));
    assert!(cmd.has_arg("add"));
    assert!(cmd.has_any_arg(&["del", "add"]));
    assert!(!cmd.has_any_arg(&["del"]));
    assert!(cmd.has_any_flag(&["no-cache", "cache-dir"]));
    assert!(!cmd.has_flag("update"));
}

#[test]
fn test_parse_error_is_reported() {
    assert!(parse("echo 'oops").is_err());
    assert!(parse("&& ls").is_err());
}

#[test]
fn test_empty_script_has_no_commands() {
    let parsed = parse("").unwrap();
    assert_eq!(parsed.command_count(), 0);
    assert!(!parsed.has_pipes());
}

#[test]
fn test_test_brackets_do_not_invent_commands() {
    let parsed = parse("if [[ -f /x && -d /y ]]; then echo a; fi").unwrap();
    let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["echo"]);
}

#[test]
fn test_select_loop_commands() {
    let parsed = parse("select x in a b; do echo \"$x\"; done | sudo tee /etc/choice").unwrap();
    let names: Vec<&str> = parsed.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "sudo"]);
    assert!(parsed.has_pipes());
}

#[test]
fn test_declaration_builtins_are_commands() {
    let parsed = parse("export PATH=/opt/bin:$PATH && unset TMP").unwrap();
    let export = &parsed.commands[0];
    assert!(export.is("export"));
    assert_eq!(export.positional_args(), vec!["PATH=/opt/bin:${VAR}"]);
    assert!(parsed.commands[1].is("unset"));
}

#[test]
fn test_quoting_and_escapes_are_removed() {
    let cmd = first(r#"echo "a b" 'c d' e\ f $'g'"#);
    assert_eq!(cmd.positional_args(), vec!["a b", "c d", "e f", "g"]);
}
