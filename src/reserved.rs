//! The frozen reserved-name table.
//!
//! Reserved names are interned at pool construction, in table order, before
//! anything else - their entry ids are therefore deterministic for a given
//! configuration and may be referenced without a hash lookup via
//! [`Reserved`]. The table is part of the serialization compatibility
//! contract (see [`crate::serialize`]) and must never be reordered or have
//! entries removed; new names may only be appended.

/// Declares the reserved-name table and the matching [`Reserved`] enum in one
/// place so the two cannot drift apart.
macro_rules! reserved_names {
    ($($variant:ident => $string:literal),+ $(,)?) => {
        /// All reserved names, in registration order. `"None"` is always first.
        pub const RESERVED_NAMES: &[&str] = &[$($string),+];

        /// Well-known names with pre-assigned pool entries.
        ///
        /// Converting a `Reserved` to a [`Name`](crate::Name) costs an array
        /// index instead of a hash lookup.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[repr(u16)]
        pub enum Reserved {
            $($variant),+
        }

        impl Reserved {
            /// The canonical spelling of this reserved name.
            pub fn as_str(self) -> &'static str {
                RESERVED_NAMES[self as usize]
            }

            /// Index into [`RESERVED_NAMES`].
            pub fn index(self) -> usize {
                self as usize
            }
        }
    };
}

reserved_names! {
    None => "None",
    True => "True",
    False => "False",
    Zero => "Zero",
    One => "One",
    Two => "Two",
    Three => "Three",
    Object => "Object",
    Class => "Class",
    Package => "Package",
    Function => "Function",
    Property => "Property",
    Enum => "Enum",
    Struct => "Struct",
    Interface => "Interface",
    Default => "Default",
    Name => "Name",
    String => "String",
    Text => "Text",
    Array => "Array",
    Map => "Map",
    Set => "Set",
    Bool => "Bool",
    Byte => "Byte",
    Int => "Int",
    Float => "Float",
    Double => "Double",
    Vector => "Vector",
    Rotator => "Rotator",
    Quat => "Quat",
    Transform => "Transform",
    Matrix => "Matrix",
    Color => "Color",
    Position => "Position",
    Scale => "Scale",
    Velocity => "Velocity",
    Time => "Time",
    Timer => "Timer",
    Game => "Game",
    Engine => "Engine",
    Core => "Core",
    Input => "Input",
    Output => "Output",
    Error => "Error",
    Warning => "Warning",
    Log => "Log",
    Init => "Init",
    Main => "Main",
    Root => "Root",
    World => "World",
    Level => "Level",
    Scene => "Scene",
    Camera => "Camera",
    Player => "Player",
    Pawn => "Pawn",
    Controller => "Controller",
    Component => "Component",
    Mesh => "Mesh",
    Material => "Material",
    Texture => "Texture",
    Shader => "Shader",
    Light => "Light",
    Sound => "Sound",
    Animation => "Animation",
    Montage => "Montage",
    State => "State",
    Event => "Event",
    Delegate => "Delegate",
    Tick => "Tick",
    Update => "Update",
    Render => "Render",
    Physics => "Physics",
    Collision => "Collision",
    Trigger => "Trigger",
    Overlap => "Overlap",
    Network => "Network",
    Client => "Client",
    Server => "Server",
    Replication => "Replication",
    Session => "Session",
    Config => "Config",
    Settings => "Settings",
    Profile => "Profile",
    Score => "Score",
    Health => "Health",
    Damage => "Damage",
    Team => "Team",
    Item => "Item",
    Inventory => "Inventory",
    Weapon => "Weapon",
    Projectile => "Projectile",
    Spawn => "Spawn",
    Destroy => "Destroy",
    Begin => "Begin",
    End => "End",
    Left => "Left",
    Right => "Right",
    Up => "Up",
    Down => "Down",
    Forward => "Forward",
    Backward => "Backward",
}

/// Names registered below this index have deterministic, frozen entry ids.
pub const RESERVED_NAME_THRESHOLD: usize = RESERVED_NAMES.len();
