//! Static dependency extraction from module-definition text.
//!
//! Matching is pattern based, not a structural HCL parse. An attribute is found
//! anywhere inside its block, across newlines and after other attributes, but
//! the search stops at the first closing brace, so attributes that follow a
//! nested block are not seen. Only local paths (`./\w-` characters) match;
//! remote sources such as `git::https://...` are ignored.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::path::normalize;

/// `dependency "name" { config_path = "../vpc" }`
static DEPENDENCY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bdependency\s+[\w\-"]+\s*\{[^}]*?\bconfig_path\s*=\s*"([./\w\-]+)""#)
        .expect("valid dependency regex")
});

/// `terraform { source = "../modules//vpc" }`
static TERRAFORM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bterraform\s*\{[^}]*?\bsource\s*=\s*"([./\w\-]+)""#)
        .expect("valid terraform regex")
});

/// `module "name" { source = "../modules/vpc" }`
static MODULE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bmodule\s+[\w\-"]+\s*\{[^}]*?\bsource\s*=\s*"([./\w\-]+)""#)
        .expect("valid module regex")
});

/// Dependency paths declared in `text`, resolved against `base_dir` (the
/// directory holding the file) and normalized.
pub fn parse_dependencies(text: &str, base_dir: &Path) -> BTreeSet<PathBuf> {
    [&*DEPENDENCY_BLOCK, &*TERRAFORM_BLOCK, &*MODULE_BLOCK]
        .into_iter()
        .flat_map(|pattern| pattern.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize(&base_dir.join(m.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(text: &str) -> Vec<PathBuf> {
        parse_dependencies(text, Path::new("/w/live/app"))
            .into_iter()
            .collect()
    }

    #[test]
    fn dependency_block_single_line() {
        let text = r#"dependency "vpc" { config_path = "../vpc" }"#;
        assert_eq!(deps(text), vec![PathBuf::from("/w/live/vpc")]);
    }

    #[test]
    fn dependency_block_spanning_lines() {
        let text = r#"
dependency "vpc" {
  skip_outputs = true

  mock_outputs = ["a"]
  config_path  = "../vpc"
}
"#;
        assert_eq!(deps(text), vec![PathBuf::from("/w/live/vpc")]);
    }

    #[test]
    fn terraform_source_is_resolved_and_normalized() {
        let text = r#"
terraform {
  source = "../../modules//app"
}
"#;
        assert_eq!(deps(text), vec![PathBuf::from("/w/modules/app")]);
    }

    #[test]
    fn module_block_source() {
        let text = r#"
module "db" {
  version = "1.0"
  source  = "./db"
}
"#;
        assert_eq!(deps(text), vec![PathBuf::from("/w/live/app/db")]);
    }

    #[test]
    fn collects_all_shapes_in_one_file() {
        let text = r#"
terraform {
  source = "../../modules/app"
}

dependency "vpc" {
  config_path = "../vpc"
}

dependency "db" {
  config_path = "../db"
}
"#;
        assert_eq!(
            deps(text),
            vec![
                PathBuf::from("/w/live/db"),
                PathBuf::from("/w/live/vpc"),
                PathBuf::from("/w/modules/app"),
            ]
        );
    }

    #[test]
    fn ignores_git_sources() {
        let text = r#"
terraform {
  source = "git::https://example.com/modules.git//vpc?ref=v1.0.0"
}
"#;
        assert!(deps(text).is_empty());
    }

    #[test]
    fn registry_addresses_resolve_like_local_paths() {
        let text = r#"
module "s3" {
  source = "terraform-aws-modules/s3-bucket/aws"
}
"#;
        assert_eq!(
            deps(text),
            vec![PathBuf::from(
                "/w/live/app/terraform-aws-modules/s3-bucket/aws"
            )]
        );
    }

    #[test]
    fn does_not_cross_closing_brace() {
        let text = r#"
dependency "vpc" {
  mock_outputs = {}
  config_path  = "../vpc"
}
"#;
        assert!(deps(text).is_empty());
    }

    #[test]
    fn unrelated_blocks_yield_nothing() {
        let text = r#"
locals {
  source = "../ignored"
}

include "root" {
  path = find_in_parent_folders()
}
"#;
        assert!(deps(text).is_empty());
    }
}
