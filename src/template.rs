//! Scaffold rendering for a new unit-test target.
//!
//! The scaffold is a set of ready-to-paste definitions, one per manifest
//! section, wired together through freshly generated identifiers. It is
//! reported to the operator rather than written into the manifest; creating
//! a runnable test bundle also needs scheme and file-system changes this
//! tool does not make.

use crate::ident::{IdGenerator, ObjectId};

/// Identifiers backing one test-target scaffold.
#[derive(Debug, Clone)]
pub struct TestTargetIds {
    pub target: ObjectId,
    pub product: ObjectId,
    pub config_list: ObjectId,
    pub debug_config: ObjectId,
    pub release_config: ObjectId,
    pub sources_phase: ObjectId,
    pub frameworks_phase: ObjectId,
    pub resources_phase: ObjectId,
}

impl TestTargetIds {
    pub fn generate(gen: &mut IdGenerator) -> Self {
        TestTargetIds {
            target: gen.next_id(),
            product: gen.next_id(),
            config_list: gen.next_id(),
            debug_config: gen.next_id(),
            release_config: gen.next_id(),
            sources_phase: gen.next_id(),
            frameworks_phase: gen.next_id(),
            resources_phase: gen.next_id(),
        }
    }
}

/// One definition block and the section it belongs in.
#[derive(Debug, Clone)]
pub struct ScaffoldPart {
    pub section: &'static str,
    pub text: String,
}

/// A complete rendered test-target scaffold.
#[derive(Debug, Clone)]
pub struct TestTargetScaffold {
    pub target_name: String,
    pub ids: TestTargetIds,
    pub parts: Vec<ScaffoldPart>,
}

/// Render the scaffold for `<main_target>Tests` hosted by the given
/// application product.
pub fn scaffold(
    main_target: &str,
    host_product: &str,
    gen: &mut IdGenerator,
) -> TestTargetScaffold {
    let ids = TestTargetIds::generate(gen);
    let name = format!("{main_target}Tests");

    let product_ref = format!(
        "\t\t{product} /* {name}.xctest */ = {{isa = PBXFileReference; explicitFileType = wrapper.cfbundle; includeInIndex = 0; path = {name}.xctest; sourceTree = BUILT_PRODUCTS_DIR; }};\n",
        product = ids.product,
        name = name,
    );

    let target = format!(
        concat!(
            "\t\t{target} /* {name} */ = {{\n",
            "\t\t\tisa = PBXNativeTarget;\n",
            "\t\t\tbuildConfigurationList = {config_list} /* Build configuration list for PBXNativeTarget \"{name}\" */;\n",
            "\t\t\tbuildPhases = (\n",
            "\t\t\t\t{sources} /* Sources */,\n",
            "\t\t\t\t{frameworks} /* Frameworks */,\n",
            "\t\t\t\t{resources} /* Resources */,\n",
            "\t\t\t);\n",
            "\t\t\tbuildRules = (\n",
            "\t\t\t);\n",
            "\t\t\tdependencies = (\n",
            "\t\t\t);\n",
            "\t\t\tname = {name};\n",
            "\t\t\tproductName = {name};\n",
            "\t\t\tproductReference = {product} /* {name}.xctest */;\n",
            "\t\t\tproductType = \"com.apple.product-type.bundle.unit-test\";\n",
            "\t\t}};\n",
        ),
        target = ids.target,
        name = name,
        config_list = ids.config_list,
        sources = ids.sources_phase,
        frameworks = ids.frameworks_phase,
        resources = ids.resources_phase,
        product = ids.product,
    );

    let phase = |id: &ObjectId, isa: &str, comment: &str| {
        format!(
            concat!(
                "\t\t{id} /* {comment} */ = {{\n",
                "\t\t\tisa = {isa};\n",
                "\t\t\tbuildActionMask = 2147483647;\n",
                "\t\t\tfiles = (\n",
                "\t\t\t);\n",
                "\t\t\trunOnlyForDeploymentPostprocessing = 0;\n",
                "\t\t}};\n",
            ),
            id = id,
            comment = comment,
            isa = isa,
        )
    };

    let config_list = format!(
        concat!(
            "\t\t{config_list} /* Build configuration list for PBXNativeTarget \"{name}\" */ = {{\n",
            "\t\t\tisa = XCConfigurationList;\n",
            "\t\t\tbuildConfigurations = (\n",
            "\t\t\t\t{debug} /* Debug */,\n",
            "\t\t\t\t{release} /* Release */,\n",
            "\t\t\t);\n",
            "\t\t\tdefaultConfigurationIsVisible = 0;\n",
            "\t\t\tdefaultConfigurationName = Release;\n",
            "\t\t}};\n",
        ),
        config_list = ids.config_list,
        name = name,
        debug = ids.debug_config,
        release = ids.release_config,
    );

    let build_config = |id: &ObjectId, config_name: &str| {
        format!(
            concat!(
                "\t\t{id} /* {config_name} */ = {{\n",
                "\t\t\tisa = XCBuildConfiguration;\n",
                "\t\t\tbuildSettings = {{\n",
                "\t\t\t\tBUNDLE_LOADER = \"$(TEST_HOST)\";\n",
                "\t\t\t\tCODE_SIGN_STYLE = Automatic;\n",
                "\t\t\t\tGENERATE_INFOPLIST_FILE = YES;\n",
                "\t\t\t\tLD_RUNPATH_SEARCH_PATHS = (\n",
                "\t\t\t\t\t\"$(inherited)\",\n",
                "\t\t\t\t\t\"@executable_path/../Frameworks\",\n",
                "\t\t\t\t\t\"@loader_path/../Frameworks\",\n",
                "\t\t\t\t);\n",
                "\t\t\t\tPRODUCT_BUNDLE_IDENTIFIER = com.example.{name};\n",
                "\t\t\t\tPRODUCT_NAME = \"$(TARGET_NAME)\";\n",
                "\t\t\t\tSWIFT_VERSION = 5.0;\n",
                "\t\t\t\tTEST_HOST = \"$(BUILT_PRODUCTS_DIR)/{host}.app/Contents/MacOS/{host}\";\n",
                "\t\t\t}};\n",
                "\t\t\tname = {config_name};\n",
                "\t\t}};\n",
            ),
            id = id,
            config_name = config_name,
            name = name,
            host = host_product,
        )
    };

    let parts = vec![
        ScaffoldPart {
            section: "PBXFileReference",
            text: product_ref,
        },
        ScaffoldPart {
            section: "PBXNativeTarget",
            text: target,
        },
        ScaffoldPart {
            section: "PBXSourcesBuildPhase",
            text: phase(&ids.sources_phase, "PBXSourcesBuildPhase", "Sources"),
        },
        ScaffoldPart {
            section: "PBXFrameworksBuildPhase",
            text: phase(&ids.frameworks_phase, "PBXFrameworksBuildPhase", "Frameworks"),
        },
        ScaffoldPart {
            section: "PBXResourcesBuildPhase",
            text: phase(&ids.resources_phase, "PBXResourcesBuildPhase", "Resources"),
        },
        ScaffoldPart {
            section: "XCConfigurationList",
            text: config_list,
        },
        ScaffoldPart {
            section: "XCBuildConfiguration",
            text: format!(
                "{}{}",
                build_config(&ids.debug_config, "Debug"),
                build_config(&ids.release_config, "Release")
            ),
        },
    ];

    TestTargetScaffold {
        target_name: name,
        ids,
        parts,
    }
}
