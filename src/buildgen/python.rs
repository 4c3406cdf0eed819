//! Python generator on rules_python 0.13.0.
//!
//! Each group gets its own `pip_parse` repository named `{group}_deps`, and
//! each toolchain gets a `{toolchain}_server_deps` repository for the
//! project-wide server requirements.

use crate::core::language::{Ecosystem, Language};
use crate::core::manifest::Group;
use crate::core::naming::{
    file_stem, filename_as_target, module_import_identifier, module_import_path, server_filename,
    server_target_name, split_path, toolchain_name,
};

use super::{BuildGenerator, GenContext, GenerateError};

const REPOSITORY_RULES: &str = r#"http_archive(
    name = "rules_python",
    sha256 = "8c8fe44ef0a9afc256d1e75ad5f448bb59b81aba149b8958f02f7b3a98f5d9b4",
    strip_prefix = "rules_python-0.13.0",
    url = "https://github.com/bazelbuild/rules_python/archive/refs/tags/0.13.0.tar.gz",
)
load("@rules_python//python:pip.bzl", "pip_parse")
load("@rules_python//python:repositories.bzl", "python_register_toolchains")
"#;

const BUILD_RULES: &str = "load(\"@rules_python//python:defs.bzl\", \"py_binary\", \"py_library\")\n";

fn interpreter_name(language: Language) -> String {
    format!("{}_interpreter", toolchain_name(language))
}

/// Renders rules_python documents and FastAPI servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonGenerator;

impl PythonGenerator {
    /// Names of the packages in a requirements file, quoted and wrapped in `macro(..)`.
    fn requirement_calls(
        macro_name: &str,
        requirements: &str,
        cx: &mut GenContext,
    ) -> Result<Vec<String>, GenerateError> {
        let path = cx.resolve(requirements);
        let entries = cx.cache.requirements(&path)?;
        Ok(entries
            .iter()
            .map(|entry| format!("{}(\"{}\")", macro_name, entry.coordinate))
            .collect())
    }
}

impl BuildGenerator for PythonGenerator {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn repository_rules(&self) -> String {
        REPOSITORY_RULES.to_string()
    }

    fn toolchain(&self, language: Language, cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(language)?;
        cx.server.check_requirements()?;
        let tc = toolchain_name(language);
        let interpreter = interpreter_name(language);

        let mut out = String::new();
        out.push_str("python_register_toolchains(\n");
        out.push_str(&format!("    name = \"{}\",\n", tc));
        out.push_str(&format!("    python_version = \"{}\",\n", language.formatted_version()));
        out.push_str(")\n\n");
        out.push_str(&format!(
            "load(\"@{}//:defs.bzl\", {} = \"interpreter\")\n\n",
            tc, interpreter
        ));
        out.push_str("pip_parse(\n");
        out.push_str(&format!("    name = \"{}_server_deps\",\n", tc));
        out.push_str(&format!(
            "    requirements_lock = \"{}\",\n",
            filename_as_target(&cx.server.requirements)
        ));
        out.push_str(&format!("    python_interpreter_target = {},\n", interpreter));
        out.push_str(")\n\n");
        out.push_str(&format!(
            "load(\"@{tc}_server_deps//:requirements.bzl\", {tc}_install_deps_server = \"install_deps\")\n\n"
        ));
        out.push_str(&format!("{}_install_deps_server()\n", tc));
        Ok(out)
    }

    fn target_deps(&self, group: &Group, _cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(group.language)?;
        let name = &group.name;

        let mut out = String::new();
        out.push_str("pip_parse(\n");
        out.push_str(&format!("    name = \"{}_deps\",\n", name));
        out.push_str(&format!(
            "    requirements_lock = \"{}\",\n",
            filename_as_target(&group.dependencies)
        ));
        out.push_str(&format!(
            "    python_interpreter_target = {},\n",
            interpreter_name(group.language)
        ));
        out.push_str(")\n\n");
        out.push_str(&format!(
            "load(\"@{name}_deps//:requirements.bzl\", {name}_install_deps = \"install_deps\")\n\n"
        ));
        out.push_str(&format!("{}_install_deps()\n", name));
        Ok(out)
    }

    fn build_rules(&self) -> String {
        BUILD_RULES.to_string()
    }

    fn target(&self, group: &Group, cx: &mut GenContext) -> Result<String, GenerateError> {
        self.check_language(group.language)?;
        let name = &group.name;
        let macro_name = format!("requirement_{}", name);
        let deps = Self::requirement_calls(&macro_name, &group.dependencies, cx)?;

        let mut out = String::new();
        out.push_str(&format!(
            "load(\"@{}_deps//:requirements.bzl\", {} = \"requirement\")\n\n",
            name, macro_name
        ));
        out.push_str("py_library(\n");
        out.push_str(&format!("    name = \"{}\",\n", name));
        out.push_str(&format!("    srcs = [\"{}\"],\n", filename_as_target(&group.filename)));
        out.push_str(&format!("    deps = [{}],\n", deps.join(",")));
        out.push_str(")\n");
        Ok(out)
    }

    fn server_target(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError> {
        self.check_language(language)?;
        cx.server.check_requirements()?;
        let tc = toolchain_name(language);
        let macro_name = format!("{}_requirement_server", tc);

        let server_requirements = cx.server.requirements.clone();
        let mut deps: Vec<String> = groups.iter().map(|g| format!("\":{}\"", g.name)).collect();
        deps.extend(Self::requirement_calls(&macro_name, &server_requirements, cx)?);

        let mut out = String::new();
        out.push_str(&format!(
            "load(\"@{}_server_deps//:requirements.bzl\", {} = \"requirement\")\n\n",
            tc, macro_name
        ));
        out.push_str("py_binary(\n");
        out.push_str(&format!("    name = \"{}\",\n", server_target_name(language)));
        out.push_str(&format!("    srcs = [\":{}\"],\n", server_filename(language)));
        out.push_str(&format!("    deps = [{}],\n", deps.join(",")));
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

        let mut out = String::new();
        out.push_str("import fastapi\nimport uvicorn\n\n");

        let identifiers: Vec<String> = groups
            .iter()
            .map(|group| module_import_identifier(&group.filename))
            .collect();
        for (group, identifier) in groups.iter().zip(&identifiers) {
            let stem = file_stem(split_path(&group.filename).1);
            let package = module_import_path(&group.filename);
            if package.is_empty() {
                out.push_str(&format!("import {} as {}\n", stem, identifier));
            } else {
                out.push_str(&format!("from {} import {} as {}\n", package, stem, identifier));
            }
        }

        out.push_str("\napp = fastapi.FastAPI()\n");
        for identifier in &identifiers {
            out.push_str(&format!("app.include_router({}.router)\n", identifier));
        }

        out.push_str("\n\nif __name__ == \"__main__\":\n");
        out.push_str(&format!(
            "    uvicorn.run(app, host=\"{}\", port={}, log_level=\"info\")\n",
            cx.server.host, cx.server.port
        ));
        Ok(out)
    }
}
