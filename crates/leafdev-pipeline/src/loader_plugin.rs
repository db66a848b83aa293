//! Per-extension loader rules, applied while rolldown resolves imports.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rolldown_common::ResolvedExternal;
use rolldown_plugin::{
    HookResolveIdArgs, HookResolveIdOutput, HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};

use crate::error::Diagnostic;
use crate::options::{BundleSettings, Loader};

/// Resolves `copy`-loader imports to a verbatim copy next to the bundle and
/// rejects extensions that have no loader.
///
/// Script imports are left to rolldown's resolver. With `bundle: false`
/// every import of the entry stays external.
#[derive(Debug)]
pub(crate) struct LoaderPlugin {
    out_dir: PathBuf,
    settings: BundleSettings,
    copies: Mutex<Vec<(PathBuf, PathBuf)>>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl LoaderPlugin {
    pub(crate) fn new(out_dir: impl Into<PathBuf>, settings: &BundleSettings) -> Self {
        Self {
            out_dir: out_dir.into(),
            settings: settings.clone(),
            copies: Mutex::default(),
            diagnostics: Mutex::default(),
        }
    }

    /// Copies scheduled so far as `(source, destination)` pairs.
    pub(crate) fn take_copies(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut copies = self.copies.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *copies)
    }

    /// Import errors raised by this plugin, tied to the importing file.
    pub(crate) fn take_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *diagnostics)
    }

    fn resolve(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> anyhow::Result<Option<HookResolveIdOutput>> {
        let Some(importer) = importer else {
            return Ok(None);
        };

        if !self.settings.bundle {
            return Ok(Some(external(specifier)));
        }

        if !is_relative(specifier) {
            return Ok(None);
        }

        let Some(extension) = Path::new(specifier)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
        else {
            return Ok(None);
        };

        match self.settings.loader_for(&extension) {
            Some(Loader::Js) => Ok(None),
            Some(Loader::Copy) => {
                let source = Path::new(importer)
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(specifier);
                if !source.is_file() {
                    anyhow::bail!("Could not resolve \"{}\"", specifier);
                }

                let name = asset_name(&self.settings.asset_names, &source);
                self.schedule_copy(source, self.out_dir.join(&name));
                Ok(Some(external(&format!("./{}", name))))
            }
            None => anyhow::bail!(
                "No loader is configured for \"{}\" files: {}",
                extension,
                specifier
            ),
        }
    }

    fn schedule_copy(&self, source: PathBuf, dest: PathBuf) {
        let mut copies = self.copies.lock().unwrap_or_else(|e| e.into_inner());
        if !copies.iter().any(|(_, d)| d == &dest) {
            copies.push((source, dest));
        }
    }
}

impl Plugin for LoaderPlugin {
    fn name(&self) -> Cow<'static, str> {
        "leafdev:loaders".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.as_ref().map(|i| i.to_string());
        let resolved = self.resolve(&specifier, importer.as_deref());
        if let (Err(e), Some(importer)) = (&resolved, &importer) {
            self.diagnostics
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Diagnostic::in_file(importer, e.to_string()));
        }
        async move { resolved }
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn external(id: &str) -> HookResolveIdOutput {
    HookResolveIdOutput {
        id: id.into(),
        external: Some(ResolvedExternal::Bool(true)),
        ..Default::default()
    }
}

/// Output file name for a copied asset: `[name]` is the source file stem,
/// the source extension is appended.
fn asset_name(template: &str, source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let mut name = template.replace("[name]", stem);
    if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    name
}
