//! Bundling engine backed by rolldown.
//!
//! The merged option set is mapped onto [`BundlerOptions`], rolldown builds
//! the module graph, and the generated chunk, its source map and any copied
//! assets are written next to `outfile` only once the whole build succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rolldown::{
    BundleOutput as RolldownOutput, BundlerBuilder, BundlerOptions, InputItem, OutputFormat,
    Platform, RawMinifyOptions, SourceMapType,
};
use rolldown_common::Output;
use rolldown_plugin::__inner::SharedPluginable;

use crate::bundler::{BundleOutput, Bundler};
use crate::error::{BundleError, Diagnostic};
use crate::loader_plugin::LoaderPlugin;
use crate::options::{BuildOptions, BundleSettings};

/// Bundles the site scripts with rolldown. Paths in the options are
/// resolved against `root`.
#[derive(Debug, Clone)]
pub struct RolldownBundler {
    root: PathBuf,
}

impl RolldownBundler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Bundler for RolldownBundler {
    fn bundle(&self, options: &BuildOptions) -> Result<BundleOutput, BundleError> {
        let settings = options.settings()?;
        validate(&settings)?;

        if !settings.target.is_empty() {
            tracing::debug!("Target {:?} accepted as-is", settings.target);
        }

        let entry = self.root.join(&settings.entry_points[0]);
        let outfile = self.root.join(&settings.outfile);
        let out_dir = outfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        let loaders = Arc::new(LoaderPlugin::new(&out_dir, &settings));
        let rolldown_options = configure_rolldown_options(&settings, &self.root, &entry, &out_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                BundleError::single(Diagnostic::options(format!(
                    "Failed to start bundler runtime: {}",
                    e
                )))
            })?;

        let plugin: SharedPluginable = loaders.clone();
        let generated = runtime.block_on(async move {
            let mut bundler = BundlerBuilder::default()
                .with_options(rolldown_options)
                .with_plugins(vec![plugin])
                .build()
                .map_err(|e| format!("{:?}", e))?;
            bundler.generate().await.map_err(|e| format!("{:?}", e))
        });

        let generated = match generated {
            Ok(generated) => generated,
            Err(message) => {
                let mut diagnostics = loaders.take_diagnostics();
                if diagnostics.is_empty() {
                    diagnostics.push(Diagnostic::in_file(&entry, message));
                }
                return Err(BundleError::new(diagnostics));
            }
        };

        let copies = loaders.take_copies();
        let output = write_output(&outfile, &out_dir, &generated, &copies)?;

        tracing::debug!(
            "Bundled {} modules into {}",
            output.modules,
            output.outfile.display()
        );
        Ok(output)
    }
}

fn validate(settings: &BundleSettings) -> Result<(), BundleError> {
    let mut diagnostics = Vec::new();

    if settings.entry_points.len() != 1 {
        diagnostics.push(Diagnostic::options(format!(
            "Expected exactly one entry point with outfile, got {}",
            settings.entry_points.len()
        )));
    }

    if settings.format != "esm" {
        diagnostics.push(Diagnostic::options(format!(
            "Unsupported format \"{}\"",
            settings.format
        )));
    }

    if settings.asset_names.replace("[name]", "").contains('[') {
        diagnostics.push(Diagnostic::options(format!(
            "Unsupported placeholder in assetNames \"{}\"",
            settings.asset_names
        )));
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(BundleError::new(diagnostics))
    }
}

/// Map the typed settings onto rolldown's options.
fn configure_rolldown_options(
    settings: &BundleSettings,
    root: &Path,
    entry: &Path,
    out_dir: &Path,
) -> BundlerOptions {
    let name = settings
        .outfile
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bundle")
        .to_string();

    BundlerOptions {
        input: Some(vec![InputItem {
            name: Some(name),
            import: entry.to_string_lossy().into_owned(),
        }]),
        cwd: Some(root.to_path_buf()),
        dir: Some(out_dir.to_string_lossy().into_owned()),
        format: Some(OutputFormat::Esm),
        platform: Some(Platform::Browser),
        minify: settings.minify.then(|| RawMinifyOptions::from(true)),
        sourcemap: settings.sourcemap.then_some(SourceMapType::File),
        ..Default::default()
    }
}

/// Write the entry chunk to `outfile` and everything else under `out_dir`.
fn write_output(
    outfile: &Path,
    out_dir: &Path,
    generated: &RolldownOutput,
    copies: &[(PathBuf, PathBuf)],
) -> Result<BundleOutput, BundleError> {
    let io_error = |path: &Path, e: std::io::Error| {
        BundleError::single(Diagnostic::in_file(path, format!("Failed to write: {}", e)))
    };

    fs::create_dir_all(out_dir).map_err(|e| io_error(out_dir, e))?;

    let mut modules = 0;
    for item in &generated.assets {
        match item {
            Output::Chunk(chunk) if chunk.is_entry => {
                modules += chunk.module_ids.len();
                let mut code = chunk.code.clone();

                if let Some(map) = &chunk.map {
                    let map_path = with_suffix(outfile, ".map");
                    fs::write(&map_path, map.to_json_string())
                        .map_err(|e| io_error(map_path.as_path(), e))?;
                    if !code.contains("sourceMappingURL") {
                        let map_name = map_path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        code.push_str(&format!("\n//# sourceMappingURL={}\n", map_name));
                    }
                }

                fs::write(outfile, code).map_err(|e| io_error(outfile, e))?;
            }
            Output::Chunk(chunk) => {
                modules += chunk.module_ids.len();
                let path = out_dir.join(chunk.filename.as_str());
                fs::write(&path, &chunk.code).map_err(|e| io_error(path.as_path(), e))?;
            }
            Output::Asset(asset) => {
                let path = out_dir.join(asset.filename.as_str());
                fs::write(&path, asset.source.as_bytes())
                    .map_err(|e| io_error(path.as_path(), e))?;
            }
        }
    }

    let mut assets = Vec::with_capacity(copies.len());
    for (from, to) in copies {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        fs::copy(from, to).map_err(|e| io_error(to.as_path(), e))?;
        assets.push(to.clone());
    }

    Ok(BundleOutput {
        outfile: outfile.to_path_buf(),
        modules,
        assets,
    })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    fn project(files: &[(&str, &str)]) -> TempDir {
        let temp = tempdir().unwrap();
        for (path, content) in files {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        temp
    }

    fn options() -> BuildOptions {
        BuildOptions::base("src/index.js", "build/bundle.js")
    }

    fn read_bundle(temp: &TempDir) -> String {
        fs::read_to_string(temp.path().join("build/bundle.js")).unwrap()
    }

    #[test]
    fn bundles_relative_imports() {
        let temp = project(&[
            (
                "src/index.js",
                "import { greet } from './greet.js';\nconsole.log(greet('site'));\n",
            ),
            (
                "src/greet.js",
                "export function greet(name) { return 'hello ' + name; }\n",
            ),
        ]);

        let output = RolldownBundler::new(temp.path()).bundle(&options()).unwrap();

        assert!(output.modules >= 2);
        assert_eq!(output.outfile, temp.path().join("build/bundle.js"));
        let bundle = read_bundle(&temp);
        assert!(bundle.contains("hello "), "{bundle}");
        assert!(!bundle.contains("./greet.js"), "{bundle}");
    }

    #[test]
    fn keeps_same_private_names_apart() {
        let temp = project(&[
            (
                "src/index.js",
                "import { a } from './a.js';\nimport { b } from './b.js';\nconsole.log(a(), b());\n",
            ),
            (
                "src/a.js",
                "const label = 'from-a';\nexport function a() { return label; }\n",
            ),
            (
                "src/b.js",
                "const label = 'from-b';\nexport function b() { return label; }\n",
            ),
        ]);

        RolldownBundler::new(temp.path())
            .bundle(&options().with("minify", false))
            .unwrap();
        let bundle = read_bundle(&temp);

        assert!(bundle.contains("from-a") && bundle.contains("from-b"), "{bundle}");
        assert_eq!(bundle.matches("const label =").count(), 1, "{bundle}");
    }

    #[test]
    fn imports_are_usable_before_their_statement() {
        let temp = project(&[
            (
                "src/index.js",
                "console.log(x);\nimport { y as x } from './a.js';\n",
            ),
            ("src/a.js", "export const y = 'hoisted';\n"),
        ]);

        RolldownBundler::new(temp.path())
            .bundle(&options().with("minify", false))
            .unwrap();
        let bundle = read_bundle(&temp);

        let defined = bundle.find("hoisted").unwrap();
        let used = bundle.find("console.log").unwrap();
        assert!(defined < used, "{bundle}");
    }

    #[test]
    fn minify_shrinks_output() {
        let temp = project(&[(
            "src/index.js",
            "const answer = 42;\n\n\nconsole.log(answer);\n",
        )]);

        RolldownBundler::new(temp.path()).bundle(&options()).unwrap();
        let minified = read_bundle(&temp);

        RolldownBundler::new(temp.path())
            .bundle(&options().with("minify", false))
            .unwrap();
        let pretty = read_bundle(&temp);

        assert!(minified.len() < pretty.len());
    }

    #[test]
    fn copies_font_assets_without_hash() {
        let temp = project(&[
            (
                "src/index.js",
                "import './fonts/inter.woff2';\nconsole.log('fonts');\n",
            ),
            ("src/fonts/inter.woff2", "binary-font-data"),
        ]);

        let output = RolldownBundler::new(temp.path()).bundle(&options()).unwrap();

        let copied = temp.path().join("build/inter.woff2");
        assert_eq!(output.assets, vec![copied.clone()]);
        assert_eq!(fs::read_to_string(copied).unwrap(), "binary-font-data");
        assert!(read_bundle(&temp).contains("./inter.woff2"));
    }

    #[test]
    fn source_map_points_at_original_modules() {
        let temp = project(&[
            (
                "src/index.js",
                "import { accent } from './theme.js';\nconsole.log(accent);\n",
            ),
            ("src/theme.js", "export const accent = 'green';\n"),
        ]);

        RolldownBundler::new(temp.path())
            .bundle(&options().with("sourcemap", true))
            .unwrap();

        let map: Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("build/bundle.js.map")).unwrap(),
        )
        .unwrap();
        let sources: Vec<&str> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(sources.iter().any(|s| s.ends_with("index.js")), "{sources:?}");
        assert!(sources.iter().any(|s| s.ends_with("theme.js")), "{sources:?}");
        assert!(read_bundle(&temp).contains("sourceMappingURL=bundle.js.map"));
    }

    #[test]
    fn syntax_error_writes_nothing() {
        let temp = project(&[("src/index.js", "const = ;\n")]);

        let err = RolldownBundler::new(temp.path())
            .bundle(&options())
            .unwrap_err();

        assert!(!err.diagnostics.is_empty());
        assert!(!temp.path().join("build/bundle.js").exists());
    }

    #[test]
    fn unresolved_import_fails() {
        let temp = project(&[("src/index.js", "import './missing.js';\n")]);

        let err = RolldownBundler::new(temp.path())
            .bundle(&options())
            .unwrap_err();

        assert!(!err.diagnostics.is_empty());
        assert!(!temp.path().join("build/bundle.js").exists());
    }

    #[test]
    fn missing_loader_names_the_importer() {
        let temp = project(&[
            ("src/index.js", "import './style.css';\n"),
            ("src/style.css", "body {}"),
        ]);

        let err = RolldownBundler::new(temp.path())
            .bundle(&options())
            .unwrap_err();

        let diagnostic = &err.diagnostics[0];
        assert!(diagnostic.message.contains("No loader"), "{diagnostic}");
        assert!(diagnostic
            .file
            .as_ref()
            .is_some_and(|f| f.ends_with("src/index.js")));
    }

    #[test]
    fn rejects_unsupported_format() {
        let temp = project(&[("src/index.js", "console.log(1);\n")]);

        let err = RolldownBundler::new(temp.path())
            .bundle(&options().with("format", json!("iife")))
            .unwrap_err();

        assert!(err.diagnostics[0].message.contains("Unsupported format"));
    }

    #[test]
    fn keeps_entry_exports() {
        let temp = project(&[
            (
                "src/index.js",
                "export * from './util.js';\nexport const version = 1;\n",
            ),
            ("src/util.js", "export function clamp(v) { return v; }\n"),
        ]);

        RolldownBundler::new(temp.path())
            .bundle(&options().with("minify", false))
            .unwrap();
        let bundle = read_bundle(&temp);

        assert!(bundle.contains("export {"), "{bundle}");
        assert!(bundle.contains("clamp"));
        assert!(bundle.contains("version"));
    }
}
