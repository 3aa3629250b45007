//! Display aliases handed out per session.

use rand::seq::SliceRandom;

const FALLBACK_ALIAS: &str = "Stranger";

const ALIASES: &[&str] = &[
    "CaptainQuirk", "AgentZero", "CyberSamurai", "DataDynamo", "EchoRider",
    "GlitchGoblin", "HexHelper", "InfoInferno", "JoltJester", "KarmaKoder",
    "LoopLegend", "MegaMind", "NanoNinja", "OmegaOracle", "PixelPioneer",
    "QuantumQuick", "RetroRanger", "SyntaxSorcerer", "TerraTracker", "UltraUser",
    "VectorViking", "WaveWhisperer", "XenoXpert", "YottaYodeler", "ZetaZoomer",
    "AlphaAdventurer", "BinaryBard", "CircuitSage", "DigitalDruid", "EtherExplorer",
    "FluxFighter", "GigaGuru", "HyperHacker", "IonicIllusionist", "JigsawJuggler",
    "KiloKnight", "LaserLurker", "MatrixMagician", "NeutronNavigator", "OctalOutlaw",
    "PhotonPhantom", "QuasarQuester", "RuneReaper", "SiliconSpecter", "TechnoTitan",
    "UserUnusual", "VirtualVoyager", "WidgetWizard", "XFactorX", "ByteBuddy",
    "CodeComet", "DataDaredevil", "LogicLynx", "ScriptScout", "WebWanderer",
];

/// Pick a random alias from the built-in list.
pub fn random_alias() -> String {
    ALIASES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_ALIAS)
        .to_string()
}

#[cfg(test)]
pub(crate) fn is_known_alias(alias: &str) -> bool {
    ALIASES.contains(&alias)
}
