//! Build script for avpipe
//!
//! Handles:
//! 1. Compiling the C accessor library via `cc`
//! 2. Linking the FFmpeg libraries (avcodec, avformat, avfilter, avutil)

use std::env;
use std::path::{Path, PathBuf};

/// FFmpeg libraries this crate drives
const FFMPEG_LIBS: [&str; 4] = ["avformat", "avfilter", "avcodec", "avutil"];

fn main() {
    // Get target information
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    // Get FFmpeg directory
    let ffmpeg_dir = get_ffmpeg_dir(&target_os, &target_arch);

    // Compile C accessor library
    compile_accessors(&ffmpeg_dir);

    // Link FFmpeg libraries
    link_ffmpeg(&ffmpeg_dir, &target_os);

    // Re-run if these files change
    println!("cargo:rerun-if-changed=src/ffi/accessors.c");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
}

/// Get FFmpeg installation directory
fn get_ffmpeg_dir(target_os: &str, target_arch: &str) -> PathBuf {
    // Check for custom FFMPEG_DIR environment variable
    if let Ok(dir) = env::var("FFMPEG_DIR") {
        return PathBuf::from(dir);
    }

    // Check for pkg-config on Unix systems
    #[cfg(unix)]
    {
        if let Ok(output) = std::process::Command::new("pkg-config")
            .args(["--variable=prefix", "libavcodec"])
            .output()
        {
            if output.status.success() {
                let prefix = String::from_utf8_lossy(&output.stdout);
                let path = PathBuf::from(prefix.trim());
                if path.exists() {
                    return path;
                }
            }
        }
    }

    // Try common installation paths
    let common_paths = match target_os {
        "macos" => vec![
            "/opt/homebrew", // Apple Silicon Homebrew
            "/usr/local",    // Intel Homebrew / manual install
            "/opt/local",    // MacPorts
        ],
        "linux" => vec![
            "/usr",
            "/usr/local",
            "/opt/ffmpeg",
        ],
        "windows" => vec![
            "C:\\ffmpeg",
            "C:\\Program Files\\ffmpeg",
        ],
        _ => vec![],
    };

    for path in common_paths {
        let p = PathBuf::from(path);
        if p.join("include/libavcodec/avcodec.h").exists() {
            return p;
        }
    }

    // Try bundled FFmpeg in project directory
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let platform = match (target_os, target_arch) {
        ("macos", "aarch64") => "darwin-arm64",
        ("macos", "x86_64") => "darwin-x64",
        ("linux", "x86_64") => "linux-x64",
        ("linux", "aarch64") => "linux-arm64",
        ("windows", "x86_64") => "win32-x64",
        _ => "unknown",
    };

    let bundled = manifest_dir.join("ffmpeg").join(platform);
    if bundled.exists() {
        return bundled;
    }

    // Fallback: assume FFmpeg is in system paths
    println!("cargo:warning=FFmpeg not found. Set FFMPEG_DIR environment variable or install FFmpeg.");
    PathBuf::from("/usr/local")
}

/// Compile the C accessor library
fn compile_accessors(ffmpeg_dir: &Path) {
    let include_dir = ffmpeg_dir.join("include");

    let mut build = cc::Build::new();
    build
        .file("src/ffi/accessors.c")
        .include(&include_dir)
        .warnings(true)
        .extra_warnings(true);

    // Platform-specific flags
    #[cfg(target_os = "macos")]
    {
        build.flag("-Wno-deprecated-declarations");
    }

    // Compile
    build.compile("ffmpeg_accessors");
}

/// Link FFmpeg libraries
fn link_ffmpeg(ffmpeg_dir: &Path, target_os: &str) {
    let lib_dir = ffmpeg_dir.join("lib");

    // Determine if we should use static or dynamic linking
    // Check for explicit preference first
    let use_static = match env::var("FFMPEG_STATIC").as_deref() {
        Ok("0") | Ok("false") | Ok("no") => false,
        Ok("1") | Ok("true") | Ok("yes") => true,
        _ => {
            // Auto-detect: Prefer static linking when available
            lib_dir.join("libavcodec.a").exists()
        }
    };

    if use_static {
        // For true static linking, link the .a files directly so the linker
        // cannot pick up dylibs first
        for lib in &FFMPEG_LIBS {
            let static_lib = lib_dir.join(format!("lib{}.a", lib));
            if static_lib.exists() {
                println!("cargo:rustc-link-arg={}", static_lib.display());
            } else {
                println!("cargo:rustc-link-search=native={}", lib_dir.display());
                println!("cargo:rustc-link-lib=static={}", lib);
            }
        }
    } else {
        // Add library search path for dynamic linking
        if lib_dir.exists() {
            println!("cargo:rustc-link-search=native={}", lib_dir.display());
        }

        for lib in &FFMPEG_LIBS {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
    }

    // Platform-specific system libraries
    link_platform_libraries(target_os);
}

/// Link platform-specific system libraries
fn link_platform_libraries(target_os: &str) {
    match target_os {
        "macos" => {
            // macOS frameworks for hardware acceleration
            let frameworks = [
                "VideoToolbox",
                "CoreMedia",
                "CoreVideo",
                "CoreFoundation",
                "Security",
                "AudioToolbox",
                "CoreServices",
            ];

            for framework in &frameworks {
                println!("cargo:rustc-link-lib=framework={}", framework);
            }

            // System libraries
            println!("cargo:rustc-link-lib=z");
            println!("cargo:rustc-link-lib=bz2");
            println!("cargo:rustc-link-lib=iconv");
            println!("cargo:rustc-link-lib=lzma");
        }

        "linux" => {
            // Basic system libraries
            println!("cargo:rustc-link-lib=z");
            println!("cargo:rustc-link-lib=m");
            println!("cargo:rustc-link-lib=pthread");
            println!("cargo:rustc-link-lib=dl");

            // VAAPI for hardware acceleration (if available)
            #[cfg(feature = "hwaccel")]
            {
                println!("cargo:rustc-link-lib=va");
                println!("cargo:rustc-link-lib=va-drm");
                println!("cargo:rustc-link-lib=va-x11");
            }
        }

        "windows" => {
            // Windows system libraries
            let libs = [
                "bcrypt",
                "ole32",
                "oleaut32",
                "user32",
                "ws2_32",
                "secur32",
                "advapi32",
            ];

            for lib in &libs {
                println!("cargo:rustc-link-lib={}", lib);
            }

            // Media Foundation for hardware acceleration
            #[cfg(feature = "hwaccel")]
            {
                println!("cargo:rustc-link-lib=mfplat");
                println!("cargo:rustc-link-lib=mfuuid");
            }
        }

        _ => {
            println!("cargo:warning=Unknown target OS: {}", target_os);
        }
    }
}
