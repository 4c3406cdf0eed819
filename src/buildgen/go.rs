//! Go generator on rules_go v0.36.0 and gazelle v0.27.0.
//!
//! A group's dependency file is its `go.mod`; the `go.sum` next to it pins
//! the `go_repository` versions.

use std::collections::HashMap;
use std::path::Path;

use crate::core::language::{Ecosystem, Language};
use crate::core::manifest::Group;
use crate::core::naming::{
    filename_as_target, server_filename, server_target_name, target_name, toolchain_name,
};
use crate::deps::go_sum::max_versions;
use crate::deps::DependencyEntry;

use super::{push_list, BuildGenerator, GenContext, GenerateError};

const REPOSITORY_RULES: &str = r#"http_archive(
    name = "io_bazel_rules_go",
    sha256 = "ae013bf35bd23234d1dea46b079f1e05ba74ac0321423830119d3e787ec73483",
    urls = [
        "https://github.com/bazelbuild/rules_go/releases/download/v0.36.0/rules_go-v0.36.0.zip",
    ],
)

http_archive(
    name = "bazel_gazelle",
    sha256 = "efbbba6ac1a4fd342d5122cbdfdb82aeb2cf2862e35022c752eaddffada7c3f3",
    urls = [
        "https://mirror.bazel.build/github.com/bazelbuild/bazel-gazelle/releases/download/v0.27.0/bazel-gazelle-v0.27.0.tar.gz",
        "https://github.com/bazelbuild/bazel-gazelle/releases/download/v0.27.0/bazel-gazelle-v0.27.0.tar.gz",
    ],
)

load("@io_bazel_rules_go//go:deps.bzl", "go_download_sdk", "go_register_toolchains", "go_rules_dependencies")
load("@bazel_gazelle//:deps.bzl", "gazelle_dependencies", "go_repository")

go_rules_dependencies()
"#;

const BUILD_RULES: &str = "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_binary\", \"go_library\")\n";

/// Renders rules_go documents and `net/http` servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoGenerator;

impl GoGenerator {
    /// Raw go.sum entries of the module a group belongs to.
    fn go_sum_entries(
        group: &Group,
        cx: &mut GenContext,
    ) -> Result<Vec<DependencyEntry>, GenerateError> {
        let path = cx.resolve(Path::new(group.dependencies_dir()).join("go.sum"));
        Ok(cx.cache.go_sum(&path)?)
    }

    fn render_repositories(entries: &[DependencyEntry]) -> String {
        let mut out = String::new();
        for entry in entries {
            out.push_str("go_repository(\n");
            out.push_str(&format!("    name = \"{}\",\n", target_name(&entry.coordinate)));
            out.push_str(&format!("    importpath = \"{}\",\n", entry.coordinate));
            out.push_str(&format!("    sum = \"{}\",\n", entry.integrity));
            out.push_str(&format!("    version = \"{}\",\n", entry.version));
            out.push_str(")\n");
        }
        out
    }
}

impl BuildGenerator for GoGenerator {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn repository_rules(&self) -> String {
        REPOSITORY_RULES.to_string()
    }

    fn toolchain(&self, language: Language, _cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(language)?;
        let tc = toolchain_name(language);

        let mut out = String::new();
        out.push_str("go_download_sdk(\n");
        out.push_str(&format!("    name = \"{}\",\n", tc));
        out.push_str(&format!("    version = \"{}\",\n", language.formatted_version()));
        out.push_str(")\n\n");
        out.push_str("go_register_toolchains()\n\n");
        out.push_str(&format!("gazelle_dependencies(go_sdk = \"{}\")\n", tc));
        Ok(out)
    }

    fn target_deps(&self, group: &Group, cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(group.language)?;
        let entries = Self::go_sum_entries(group, cx)?;
        Ok(Self::render_repositories(&max_versions(&entries)?))
    }

    /// Bazel rejects two `go_repository` rules with one name, so the go.sum
    /// entries of all groups are merged before version selection.
    fn toolchain_deps(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError> {
        self.check_language(language)?;
        let mut merged = Vec::new();
        for group in groups {
            merged.extend(Self::go_sum_entries(group, cx)?);
        }
        Ok(Self::render_repositories(&max_versions(&merged)?))
    }

    fn build_rules(&self) -> String {
        BUILD_RULES.to_string()
    }

    fn target(&self, group: &Group, cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(group.language)?;
        let go_mod_path = cx.resolve(&group.dependencies);
        let go_mod = cx.cache.go_mod(&go_mod_path)?;
        let deps: Vec<String> = go_mod
            .requires
            .iter()
            .map(|require| format!("\"@{}//:go_default_library\"", target_name(&require.path)))
            .collect();

        let mut out = String::new();
        out.push_str("go_library(\n");
        out.push_str(&format!("    name = \"{}\",\n", group.name));
        out.push_str(&format!("    srcs = [\"{}\"],\n", filename_as_target(&group.filename)));
        out.push_str(&format!("    importpath = \"{}\",\n", go_mod.module_path));
        push_list(&mut out, "deps", &deps);
        out.push_str(")\n");
        Ok(out)
    }

    fn server_target(
        &self,
        language: Language,
        groups: &[&Group],
        _cx: &mut GenContext,
    ) -> Result<String, GenerateError> {
        self.check_language(language)?;
        let deps: Vec<String> = groups.iter().map(|g| format!("\":{}\"", g.name)).collect();

        let mut out = String::new();
        out.push_str("go_binary(\n");
        out.push_str(&format!("    name = \"{}\",\n", server_target_name(language)));
        out.push_str(&format!("    srcs = [\":{}\"],\n", server_filename(language)));
        push_list(&mut out, "deps", &deps);
        out.push_str(")\n");
        Ok(out)
    }

    fn server(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError> {
        self.check_language(language)?;

        let mut imports = Vec::new();
        let mut handlers = Vec::new();
        let mut owners: HashMap<String, &str> = HashMap::new();
        for group in groups {
            let go_mod_path = cx.resolve(&group.dependencies);
            let go_mod = cx.cache.go_mod(&go_mod_path)?;
            // One import and one set of handler variables per module.
            if let Some(first) = owners.insert(go_mod.module_path.clone(), &group.name) {
                return Err(GenerateError::DuplicateGoModule {
                    module: go_mod.module_path.clone(),
                    first: first.to_string(),
                    second: group.name.clone(),
                });
            }
            let alias = target_name(&go_mod.module_path);
            imports.push(format!("\t{} \"{}\"\n", alias, go_mod.module_path));
            for endpoint in &group.endpoints {
                let handler = format!("{}_{}", alias, endpoint.name);
                handlers.push(format!(
                    "\t{handler} := {alias}.New{name}()\n\thttp.Handle({alias}.{name}Pattern, {handler})\n",
                    name = endpoint.name
                ));
            }
        }

        let mut out = String::new();
        out.push_str("package main\n\nimport (\n\t\"log\"\n\t\"net/http\"\n\n");
        for import in &imports {
            out.push_str(import);
        }
        out.push_str(")\n\nfunc main() {\n");
        for handler in &handlers {
            out.push_str(handler);
        }
        out.push_str(&format!(
            "\tlog.Fatal(http.ListenAndServe(\"{}\", nil))\n}}\n",
            cx.server.address()
        ));
        Ok(out)
    }
}
