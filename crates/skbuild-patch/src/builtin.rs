//! Patch sets shipped with skbuild.

use crate::error::{PatchError, Result};
use crate::patch::PatchSet;

/// Embedded patch set definitions as `(name, toml)`.
const BUILTIN: [(&str, &str); 2] = [
    ("wasm-demo", include_str!("../patches/wasm-demo.toml")),
    ("dawn-apple", include_str!("../patches/dawn-apple.toml")),
];

/// Names of the built-in sets.
pub fn names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(name, _)| *name).collect()
}

/// Look up a built-in set by name.
pub fn builtin(name: &str) -> Result<PatchSet> {
    let (_, text) = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| PatchError::UnknownSet {
            name: name.to_string(),
            available: names().join(", "),
        })?;
    PatchSet::from_toml(text)
}

/// Every built-in set, parsed.
pub fn builtin_sets() -> Result<Vec<PatchSet>> {
    BUILTIN.iter().map(|(_, text)| PatchSet::from_toml(text)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchState;
    use std::path::Path;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    const DAWN_CAPS: &str = r#"#include "src/gpu/graphite/dawn/DawnCaps.h"

#include <algorithm>

void DawnCaps::initCaps(const DawnBackendContext& backendContext) {
    wgpu::Limits limits{};
    backendContext.fDevice.GetLimits(&limits);
    if (limits.maxStorageBuffersPerShaderStage == WGPU_LIMIT_U32_UNDEFINED) {
        fStorageBufferSupport = false;
    }
}
"#;

    const SK_MEMORY: &str = r#"#include <cstdlib>

void sk_abort_no_print() {
#if defined(SK_DEBUG_BREAK)
    { debug_break(); }
#endif
    abort();
}

void sk_out_of_memory() {
    abort();
}
"#;

    const ARGS_GNI: &str = "declare_args() {
  dawn_enable_metal = is_mac || is_ios
  dawn_enable_vulkan = is_linux || is_android
}
";

    const BUILD_GN: &str = r#"action("cmake_dawn") {
  args = [ "--target_os=" + target_os ]
  args += sanitizer_args
}
"#;

    const BUILD_DAWN_PY: &str = r#"from cmake_utils import (get_cmake_os_cpu, get_linux_settings,
                         get_windows_settings, quote_if_needed, write_depfile,
                         discover_dependencies)


def main():
  parser = argparse.ArgumentParser()
  parser.add_argument(
      "--dawn_enable_vulkan", default="false", help="Enable Vulkan backend.")
  args = parser.parse_args()

  target_os, target_cpu = get_cmake_os_cpu(args.target_os, args.target_cpu)
  if target_os == "Darwin" or target_os == "iOS":
    configure_cmd.append(f"-DCMAKE_OSX_ARCHITECTURES={target_cpu}")

  env = os.environ.copy()
"#;

    const CMAKE_UTILS_PY: &str = r#"def get_cmake_os_cpu(os, cpu):
  if os == "mac":
    target_cpu_map = {
      "arm64": "arm64",
      "x64": "x86_64",
    }
    return "Darwin", target_cpu_map[cpu]

  raise ValueError(f"unsupported os {os}")


def get_windows_settings(args):
  return []
"#;

    #[test]
    fn every_builtin_parses() {
        let sets = builtin_sets().unwrap();
        assert_eq!(sets.len(), names().len());
        for set in &sets {
            assert!(!set.files.is_empty(), "{} has no files", set.name);
            assert!(set.files.iter().all(|f| !f.rewrites.is_empty()));
        }
    }

    #[test]
    fn unknown_set_lists_available() {
        let err = builtin("nope").unwrap_err();
        assert!(matches!(err, PatchError::UnknownSet { .. }));
        assert!(err.to_string().contains("wasm-demo, dawn-apple"));
    }

    #[test]
    fn wasm_demo_applies_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/gpu/graphite/dawn/DawnCaps.cpp", DAWN_CAPS);
        write(root, "src/ports/SkMemory_malloc.cpp", SK_MEMORY);
        let set = builtin("wasm-demo").unwrap();

        let outcomes = set.apply(root).unwrap();
        assert!(outcomes.iter().all(|o| o.before == PatchState::Unpatched));

        let caps = std::fs::read_to_string(root.join("src/gpu/graphite/dawn/DawnCaps.cpp")).unwrap();
        assert!(caps.contains("|| limits.maxStorageBuffersPerShaderStage == UINT32_MAX)"));
        assert!(caps.contains(
            "    if (!backendContext.fDevice) { return; }\n    backendContext.fDevice.GetLimits"
        ));
        assert!(caps.contains("DawnCaps.h\"\n// SKBUILD_WASM_DEMO_CAPS\n#if defined(__EMSCRIPTEN__)"));

        let memory = std::fs::read_to_string(root.join("src/ports/SkMemory_malloc.cpp")).unwrap();
        assert!(!memory.contains("debug_break"));
        assert!(memory.contains("void sk_out_of_memory() {\n    abort();\n}"));

        let again = set.apply(root).unwrap();
        assert!(again.iter().all(|o| o.before == PatchState::Patched));
        assert_eq!(
            std::fs::read_to_string(root.join("src/gpu/graphite/dawn/DawnCaps.cpp")).unwrap(),
            caps
        );
    }

    #[test]
    fn dawn_apple_applies_to_all_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "third_party/dawn/args.gni", ARGS_GNI);
        write(root, "third_party/dawn/BUILD.gn", BUILD_GN);
        write(root, "third_party/dawn/build_dawn.py", BUILD_DAWN_PY);
        write(root, "third_party/dawn/cmake_utils.py", CMAKE_UTILS_PY);
        let set = builtin("dawn-apple").unwrap();

        let check = set.check(root).unwrap();
        assert_eq!(check.len(), 4);
        assert_eq!(
            std::fs::read_to_string(root.join("third_party/dawn/args.gni")).unwrap(),
            ARGS_GNI
        );

        set.apply(root).unwrap();
        let read = |rel: &str| std::fs::read_to_string(root.join(rel)).unwrap();

        let args = read("third_party/dawn/args.gni");
        assert!(args.contains("is_android\n\n  # Set to"));
        assert!(args.contains("  dawn_target_platform = \"\"\n}"));

        let build = read("third_party/dawn/BUILD.gn");
        assert!(build.contains("  if (is_ios && defined(ios_use_simulator) && ios_use_simulator) {"));
        assert!(build.contains("    args += [ \"--visionos\" ]"));
        assert!(build.ends_with("  args += sanitizer_args\n}\n"));

        let py = read("third_party/dawn/build_dawn.py");
        assert!(py.contains("get_windows_settings, get_ios_settings,"));
        assert!(py.contains("\"--ios_simulator\", action=\"store_true\""));
        assert!(py.contains("-DCMAKE_SYSTEM_NAME=visionOS"));

        let cmake = read("third_party/dawn/cmake_utils.py");
        assert!(cmake.contains("    return \"iOS\", target_cpu_map[cpu]"));
        assert!(cmake.contains("def get_visionos_settings(target_cpu, is_simulator=False):"));
        assert_eq!(cmake.matches("def get_windows_settings(args):").count(), 1);

        let again = set.apply(root).unwrap();
        assert!(again.iter().all(|o| o.rewrites == 0));
        assert_eq!(read("third_party/dawn/cmake_utils.py"), cmake);
    }

    #[test]
    fn dawn_apple_against_moved_upstream_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "third_party/dawn/args.gni", "declare_args() {\n}\n");
        write(root, "third_party/dawn/BUILD.gn", BUILD_GN);
        write(root, "third_party/dawn/build_dawn.py", BUILD_DAWN_PY);
        write(root, "third_party/dawn/cmake_utils.py", CMAKE_UTILS_PY);

        let err = builtin("dawn-apple").unwrap().apply(root).unwrap_err();
        assert!(matches!(err, PatchError::AnchorNotFound { .. }));
        assert_eq!(
            std::fs::read_to_string(root.join("third_party/dawn/BUILD.gn")).unwrap(),
            BUILD_GN
        );
    }
}
