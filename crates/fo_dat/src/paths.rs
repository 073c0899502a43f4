//! Well known asset directories.

/// Directory an asset kind lives in, relative to the data root
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// Critter animation frames
    ArtCritters,
    /// Interface art
    ArtInterface,
    /// Inventory pictures
    ArtInventory,
    /// Item art
    ArtItems,
    /// Miscellaneous art
    ArtMisc,
    /// Scenery art
    ArtScenery,
    /// Skilldex art
    ArtSkilldex,
    /// Splash screens
    ArtSplash,
    /// Floor and roof tiles
    ArtTiles,
    /// Wall art
    ArtWalls,
    /// Maps
    Maps,
    /// Item prototypes
    ProtoItems,
    /// Miscellaneous prototypes
    ProtoMisc,
    /// Scenery prototypes
    ProtoScenery,
    /// Tile prototypes
    ProtoTiles,
    /// Wall prototypes
    ProtoWalls,
    /// Music
    SoundMusic,
    /// Sound effects
    SoundSfx,
    /// Game text in English
    TextEnglishGame,
    /// Maps loaded by the server
    ServerMaps,
    /// World map masks
    WorldMapMask,
    /// Critter prototypes
    CritterProto,
}

impl PathKind {
    /// Every kind, in declaration order
    pub const ALL: [PathKind; 22] = [
        PathKind::ArtCritters,
        PathKind::ArtInterface,
        PathKind::ArtInventory,
        PathKind::ArtItems,
        PathKind::ArtMisc,
        PathKind::ArtScenery,
        PathKind::ArtSkilldex,
        PathKind::ArtSplash,
        PathKind::ArtTiles,
        PathKind::ArtWalls,
        PathKind::Maps,
        PathKind::ProtoItems,
        PathKind::ProtoMisc,
        PathKind::ProtoScenery,
        PathKind::ProtoTiles,
        PathKind::ProtoWalls,
        PathKind::SoundMusic,
        PathKind::SoundSfx,
        PathKind::TextEnglishGame,
        PathKind::ServerMaps,
        PathKind::WorldMapMask,
        PathKind::CritterProto,
    ];

    /// Directory prefix, lowercase with a trailing `/`
    pub const fn prefix(self) -> &'static str {
        match self {
            PathKind::ArtCritters => "art/critters/",
            PathKind::ArtInterface => "art/intrface/",
            PathKind::ArtInventory => "art/inven/",
            PathKind::ArtItems => "art/items/",
            PathKind::ArtMisc => "art/misc/",
            PathKind::ArtScenery => "art/scenery/",
            PathKind::ArtSkilldex => "art/skilldex/",
            PathKind::ArtSplash => "art/splash/",
            PathKind::ArtTiles => "art/tiles/",
            PathKind::ArtWalls => "art/walls/",
            PathKind::Maps | PathKind::ServerMaps => "maps/",
            PathKind::ProtoItems => "proto/items/",
            PathKind::ProtoMisc => "proto/misc/",
            PathKind::ProtoScenery => "proto/scenery/",
            PathKind::ProtoTiles => "proto/tiles/",
            PathKind::ProtoWalls => "proto/walls/",
            PathKind::SoundMusic => "sound/music/",
            PathKind::SoundSfx => "sound/sfx/",
            PathKind::TextEnglishGame => "text/english/game/",
            PathKind::WorldMapMask => "maps/wm_mask/",
            PathKind::CritterProto => "crit_proto/",
        }
    }

    /// Path of `name` inside this directory
    pub fn join(self, name: &str) -> String {
        let name = name.trim_start_matches(['/', '\\']);
        format!("{}{name}", self.prefix())
    }
}
