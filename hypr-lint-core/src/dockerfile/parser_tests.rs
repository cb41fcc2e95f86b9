//! Tests for the Dockerfile parser.

use super::*;

fn single(dockerfile: &str) -> Instruction {
    let mut parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 1, "expected one instruction in {:?}", dockerfile);
    parsed.remove(0).instruction
}

#[test]
fn test_simple_dockerfile() {
    let dockerfile = r#"
FROM alpine:3.19
RUN apk add --no-cache nginx
CMD ["nginx", "-g", "daemon off;"]
        "#;

    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed.iter().map(|i| i.line).collect::<Vec<_>>(), vec![2, 3, 4]);

    match &parsed[0].instruction {
        Instruction::From(base) => {
            assert_eq!(base.image.name, "alpine");
            assert_eq!(base.tag.as_deref(), Some("3.19"));
            assert_eq!(base.alias, None);
        }
        other => panic!("Expected FROM, got {:?}", other),
    }

    assert_eq!(
        parsed[2].instruction,
        Instruction::Cmd(Arguments::Exec(vec![
            "nginx".into(),
            "-g".into(),
            "daemon off;".into()
        ]))
    );
}

#[test]
fn test_multi_stage_aliases() {
    let dockerfile = r#"
FROM golang:1.21 AS builder
WORKDIR /app
RUN go build -o myapp

FROM alpine:3.19
COPY --from=builder /app/myapp /usr/local/bin/
        "#;

    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 5);

    assert!(matches!(&parsed[0].instruction,
        Instruction::From(base) if base.alias.as_deref() == Some("builder")));
    match &parsed[4].instruction {
        Instruction::Copy(copy) => {
            assert_eq!(copy.from.as_deref(), Some("builder"));
            assert_eq!(copy.sources, vec!["/app/myapp".to_string()]);
            assert_eq!(copy.target, "/usr/local/bin/");
        }
        other => panic!("Expected COPY, got {:?}", other),
    }
}

#[test]
fn test_image_references() {
    let cases = [
        ("ubuntu", None, "ubuntu", None, None),
        ("library/ubuntu:22.04", None, "library/ubuntu", Some("22.04"), None),
        ("localhost:5000/app", Some("localhost:5000"), "app", None, None),
        ("quay.io/org/app:1.2@sha256:abc", Some("quay.io"), "org/app", Some("1.2"), Some("sha256:abc")),
        ("ghcr.io/org/app@sha256:abc", Some("ghcr.io"), "org/app", None, Some("sha256:abc")),
    ];

    for (reference, registry, name, tag, digest) in cases {
        let (image, parsed_tag, parsed_digest) = parse_image_ref(reference);
        assert_eq!(image.registry.as_deref(), registry, "registry of {}", reference);
        assert_eq!(image.name, name, "name of {}", reference);
        assert_eq!(parsed_tag.as_deref(), tag, "tag of {}", reference);
        assert_eq!(parsed_digest.as_deref(), digest, "digest of {}", reference);
    }
}

#[test]
fn test_from_platform_flag() {
    let instruction = single("FROM --platform=linux/amd64 debian:12 as base");
    match instruction {
        Instruction::From(base) => {
            assert_eq!(base.platform.as_deref(), Some("linux/amd64"));
            assert_eq!(base.alias.as_deref(), Some("base"));
        }
        other => panic!("Expected FROM, got {:?}", other),
    }
}

#[test]
fn test_line_continuation() {
    let dockerfile = r#"
FROM alpine:3.19
RUN apk add --no-cache \
    nginx \
    # comments inside a continuation are dropped
    curl \

    bash
USER nginx
        "#;

    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed[1].line, 3);
    assert_eq!(parsed[2].line, 9);
    match &parsed[1].instruction {
        Instruction::Run(run) => {
            assert_eq!(run.command, Arguments::Shell("apk add --no-cache nginx curl bash".into()))
        }
        other => panic!("Expected RUN, got {:?}", other),
    }
}

#[test]
fn test_comments_are_kept() {
    let dockerfile = r#"
# hypr-lint ignore=DL3006
FROM alpine # not a comment
        "#;

    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].instruction, Instruction::Comment("hypr-lint ignore=DL3006".into()));
    assert!(matches!(&parsed[1].instruction, Instruction::From(base) if base.image.name == "alpine"));
}

#[test]
fn test_run_flags() {
    let instruction = single(
        "RUN --mount=type=cache,target=/var/cache/apt --network=none apt-get update",
    );
    match instruction {
        Instruction::Run(run) => {
            assert_eq!(run.flags.mounts, vec!["type=cache,target=/var/cache/apt".to_string()]);
            assert_eq!(run.flags.network.as_deref(), Some("none"));
            assert_eq!(run.command, Arguments::Shell("apt-get update".into()));
        }
        other => panic!("Expected RUN, got {:?}", other),
    }
}

#[test]
fn test_run_heredoc() {
    let dockerfile = "FROM alpine\nRUN <<EOF\napk add curl\necho done\nEOF\nUSER app\n";
    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(
        parsed[1].instruction,
        Instruction::Run(RunArgs {
            command: Arguments::Shell("apk add curl\necho done".into()),
            flags: RunFlags::default(),
        })
    );
    assert_eq!(parsed[2].line, 6);
}

#[test]
fn test_heredoc_inside_command_keeps_shell_text() {
    let dockerfile = "RUN cat <<-EOT > /etc/motd\n\thello\n\tEOT\nUSER app\n";
    let parsed = parse_dockerfile(dockerfile).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(
        parsed[0].instruction,
        Instruction::Run(RunArgs {
            command: Arguments::Shell("cat <<-EOT > /etc/motd\n\thello\n\tEOT".into()),
            flags: RunFlags::default(),
        })
    );
}

#[test]
fn test_expose_parsing() {
    let instruction = single("EXPOSE 80 443/tcp 53/udp 8000-8010 ${PORT} 70000");
    match instruction {
        Instruction::Expose(ports) => {
            assert_eq!(ports.len(), 6);
            assert_eq!(ports[0], PortSpec::Port { number: 80, protocol: Protocol::Tcp });
            assert_eq!(ports[2], PortSpec::Port { number: 53, protocol: Protocol::Udp });
            assert_eq!(ports[3], PortSpec::Range { start: 8000, end: 8010, protocol: Protocol::Tcp });
            assert_eq!(ports[4], PortSpec::Variable("${PORT}".into()));
            assert_eq!(ports[5], PortSpec::Port { number: 70000, protocol: Protocol::Tcp });
        }
        other => panic!("Expected EXPOSE, got {:?}", other),
    }
}

#[test]
fn test_env_parsing() {
    assert_eq!(
        single(r#"ENV KEY1=value1 KEY2="value two""#),
        Instruction::Env(vec![
            ("KEY1".into(), "value1".into()),
            ("KEY2".into(), "value two".into())
        ])
    );
    assert_eq!(
        single("ENV KEY3 value with spaces"),
        Instruction::Env(vec![("KEY3".into(), "value with spaces".into())])
    );
}

#[test]
fn test_label_parsing() {
    assert_eq!(
        single(r#"LABEL org.opencontainers.image.title="My App" version=1.0"#),
        Instruction::Label(vec![
            ("org.opencontainers.image.title".into(), "My App".into()),
            ("version".into(), "1.0".into())
        ])
    );
}

#[test]
fn test_healthcheck_parsing() {
    assert_eq!(single("HEALTHCHECK NONE"), Instruction::Healthcheck(Healthcheck::None));

    match single("HEALTHCHECK --interval=5m --retries=3 CMD curl -f http://localhost/ || exit 1") {
        Instruction::Healthcheck(Healthcheck::Check(config)) => {
            assert_eq!(config.interval.as_deref(), Some("5m"));
            assert_eq!(config.retries, Some(3));
            assert_eq!(
                config.command,
                Arguments::Shell("curl -f http://localhost/ || exit 1".into())
            );
        }
        other => panic!("Expected HEALTHCHECK, got {:?}", other),
    }
}

#[test]
fn test_onbuild_wraps_instruction() {
    match single("ONBUILD RUN make install") {
        Instruction::Onbuild(inner) => assert!(matches!(*inner, Instruction::Run(_))),
        other => panic!("Expected ONBUILD, got {:?}", other),
    }
}

#[test]
fn test_copy_json_form_and_flags() {
    match single(r#"COPY --chown=app:app --link ["a b.txt", "/dst/"]"#) {
        Instruction::Copy(copy) => {
            assert_eq!(copy.sources, vec!["a b.txt".to_string()]);
            assert_eq!(copy.target, "/dst/");
            assert_eq!(copy.chown.as_deref(), Some("app:app"));
            assert!(copy.link);
        }
        other => panic!("Expected COPY, got {:?}", other),
    }
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert!(matches!(single("from alpine"), Instruction::From(_)));
    assert!(matches!(single("user root"), Instruction::User(u) if u == "root"));
}

#[test]
fn test_error_unknown_instruction() {
    let dockerfile = r#"
FROM alpine
INVALID instruction
        "#;
    let err = parse_dockerfile(dockerfile).unwrap_err();
    assert_eq!(err.line, 3);
    assert!(err.message.contains("INVALID"));
}

#[test]
fn test_error_structurally_invalid() {
    assert!(parse_dockerfile("FROM").is_err());
    assert!(parse_dockerfile("FROM alpine AS").is_err());
    assert!(parse_dockerfile("COPY onlyone").is_err());
    assert!(parse_dockerfile("SHELL /bin/sh -c").is_err());
    assert!(parse_dockerfile("EXPOSE http").is_err());
    assert!(parse_dockerfile("HEALTHCHECK --retries=x CMD true").is_err());
}

#[test]
fn test_dequote() {
    assert_eq!(dequote(r#""a b""#), "a b");
    assert_eq!(dequote(r#"key="v""#), "key=v");
    assert_eq!(dequote(r#"'it\s'"#), r"it\s");
    assert_eq!(dequote(r#"a\"b"#), "a\"b");
}

#[test]
fn test_tokenize_respects_quotes() {
    assert_eq!(tokenize(r#"a "b c" 'd e'"#), vec!["a", "\"b c\"", "'d e'"]);
}
