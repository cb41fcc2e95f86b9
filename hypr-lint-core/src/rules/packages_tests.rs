//! Tests for the package manager rules.

use super::*;
use crate::dockerfile::parse_dockerfile;
use crate::rules::{DynRule, Rule};

/// Whether rule `code` reports the RUN instruction `run`.
fn fails(code: &str, run: &str) -> bool {
    let rule = rules().into_iter().find(|r| r.code() == code).expect("rule exists");
    let instructions = parse_dockerfile(&format!("FROM debian:12\nRUN {}\n", run)).unwrap();
    !rule.run(&instructions).is_empty()
}

#[test]
fn test_apt_get_version_pinning() {
    assert!(fails("DL3008", "apt-get install -y curl"));
    assert!(fails("DL3008", "apt-get update && apt-get install -y curl=7.88 wget"));
    assert!(!fails("DL3008", "apt-get install -y curl=7.88 wget=1.21"));
    assert!(!fails("DL3008", "apt-get install -y \"curl=${CURL_VERSION}\""));
    assert!(!fails("DL3008", "apt-get install -y ./local.deb"));
    assert!(!fails("DL3008", "apt-get install -y -t bookworm-backports curl/bookworm-backports"));
    assert!(!fails("DL3008", "apt-get update"));
}

#[test]
fn test_apt_get_yes_flag() {
    assert!(fails("DL3014", "apt-get install curl=1"));
    assert!(!fails("DL3014", "apt-get install -y curl=1"));
    assert!(!fails("DL3014", "apt-get --assume-yes install curl=1"));
    assert!(!fails("DL3014", "apt-get -qq install curl=1"));
    assert!(fails("DL3014", "apt-get -q install curl=1"));
    assert!(!fails("DL3014", "apt-get -q=2 install curl=1"));
}

#[test]
fn test_apt_get_no_install_recommends() {
    assert!(fails("DL3015", "apt-get install -y curl"));
    assert!(!fails("DL3015", "apt-get install -y --no-install-recommends curl"));
    assert!(!fails("DL3015", "apt-get install -y -o APT::Install-Recommends=false curl"));
}

#[test]
fn test_pip_version_pinning() {
    assert!(fails("DL3013", "pip install flask"));
    assert!(fails("DL3013", "python3 -m pip install --no-cache-dir flask"));
    assert!(!fails("DL3013", "pip install flask==2.0 'requests>=2'"));
    assert!(!fails("DL3013", "pip install -r requirements.txt"));
    assert!(!fails("DL3013", "pip3 install --requirement requirements.txt ."));
    assert!(!fails("DL3013", "pip install git+https://github.com/org/repo.git"));
    assert!(!fails("DL3013", "pip install ./dist/app-1.0-py3-none-any.whl"));
    assert!(!fails("DL3013", "pip install -e ."));
    assert!(!fails("DL3013", "pip freeze"));
}

#[test]
fn test_npm_version_pinning() {
    assert!(fails("DL3016", "npm install express"));
    assert!(fails("DL3016", "npm i @angular/cli"));
    assert!(!fails("DL3016", "npm install express@4.18.2 @angular/cli@17"));
    assert!(!fails("DL3016", "npm install"));
    assert!(!fails("DL3016", "npm install git+https://github.com/org/repo.git ./local ./pkg.tgz"));
    assert!(!fails("DL3016", "npm run build"));
}

#[test]
fn test_apk_rules() {
    assert!(fails("DL3018", "apk add --no-cache curl"));
    assert!(!fails("DL3018", "apk add --no-cache curl=8.5.0-r0"));
    assert!(!fails("DL3018", "apk add --no-cache --virtual .build-deps gcc=13.2.1-r0"));
    assert!(fails("DL3019", "apk add curl=8.5.0-r0"));
    assert!(!fails("DL3019", "apk add --no-cache curl=8.5.0-r0"));
    assert!(!fails("DL3019", "--mount=type=cache,target=/var/cache/apk apk add curl=8.5.0-r0"));
    assert!(!fails("DL3019", "apk update"));
}

#[test]
fn test_apt_is_discouraged() {
    assert!(fails("DL3027", "apt install -y curl"));
    assert!(!fails("DL3027", "apt-get install -y curl"));
}

#[test]
fn test_gem_version_pinning() {
    assert!(fails("DL3028", "gem install bundler"));
    assert!(!fails("DL3028", "gem install bundler:2.4.0"));
    assert!(!fails("DL3028", "gem install bundler -v 2.4.0"));
    assert!(!fails("DL3028", "gem update --system"));
}

#[test]
fn test_yum_rules() {
    assert!(fails("DL3030", "yum install httpd-2.4.6 && yum clean all"));
    assert!(!fails("DL3030", "yum install -y httpd-2.4.6 && yum clean all"));
    assert!(fails("DL3032", "yum install -y httpd-2.4.6"));
    assert!(!fails("DL3032", "yum install -y httpd-2.4.6 && yum clean all"));
    assert!(!fails("DL3032", "yum install -y httpd-2.4.6 && rm -rf /var/cache/yum"));
    assert!(fails("DL3033", "yum install -y httpd && yum clean all"));
    assert!(!fails("DL3033", "yum install -y httpd-2.4.6 && yum clean all"));
}

#[test]
fn test_dnf_rules() {
    assert!(fails("DL3038", "dnf install httpd-2.4.6"));
    assert!(!fails("DL3038", "microdnf install -y httpd-2.4.6"));
    assert!(fails("DL3040", "dnf install -y httpd-2.4.6"));
    assert!(!fails("DL3040", "dnf install -y httpd-2.4.6 && dnf clean all"));
    assert!(fails("DL3041", "dnf install -y httpd"));
    assert!(!fails("DL3041", "dnf module install -y nodejs:18"));
}

#[test]
fn test_zypper_rules() {
    assert!(fails("DL3034", "zypper install httpd=2.4"));
    assert!(!fails("DL3034", "zypper -n install httpd=2.4"));
    assert!(!fails("DL3034", "zypper install -y httpd=2.4"));
    assert!(fails("DL3036", "zypper install -y httpd=2.4"));
    assert!(!fails("DL3036", "zypper install -y httpd=2.4 && zypper clean"));
    assert!(fails("DL3037", "zypper install -y httpd"));
    assert!(!fails("DL3037", "zypper install -y 'httpd>=2.4'"));
}

#[test]
fn test_yarn_cache_clean() {
    assert!(fails("DL3060", "yarn install"));
    assert!(!fails("DL3060", "yarn install && yarn cache clean"));
    assert!(!fails("DL3060", "yarn build"));
}

#[test]
fn test_package_rules_fail_open() {
    for rule in rules() {
        let instructions =
            parse_dockerfile("FROM debian:12\nRUN apt-get install curl && echo 'oops\n").unwrap();
        assert!(rule.run(&instructions).is_empty(), "{} reported unparseable shell", rule.code());
    }
}
