use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let src_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"))
        .join("shaders");

    // OUT_DIR is <target>/<profile>/build/<pkg>-<hash>/out; binaries live in <target>/<profile>.
    let shipped = out.ancestors().nth(3).map(|profile| profile.join("shaders"));
    if let Some(dir) = &shipped {
        fs::create_dir_all(dir).unwrap_or_else(|e| panic!("creating {}: {e}", dir.display()));
    }

    let comp = shaderc::Compiler::new().expect("shaderc compiler");
    let mut opts = shaderc::CompileOptions::new().expect("shaderc options");

    // Nothing past Vulkan 1.0 core is used by the triangle pipeline.
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for (name, kind) in [
        ("triangle.vert", shaderc::ShaderKind::Vertex),
        ("triangle.frag", shaderc::ShaderKind::Fragment),
    ] {
        let path = src_dir.join(name);
        let source = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));

        let spv = comp
            .compile_into_spirv(&source, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("compiling {name}: {e}"));

        let file = format!("{name}.spv");
        fs::write(out.join(&file), spv.as_binary_u8())
            .unwrap_or_else(|e| panic!("writing {file}: {e}"));
        if let Some(dir) = &shipped {
            fs::write(dir.join(&file), spv.as_binary_u8())
                .unwrap_or_else(|e| panic!("writing {}: {e}", dir.join(&file).display()));
        }

        println!("cargo:rerun-if-changed={}", path.display());
    }

    println!("cargo:rerun-if-changed=build.rs");
}
