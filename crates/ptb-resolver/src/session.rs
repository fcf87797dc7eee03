//! Session state: the call-sequence builder and the lookup request tracker.
//!
//! A session is recreated from scratch every round, seeded only with the
//! encoded discovered-data table. The builder accumulates inputs and
//! commands behind positional handles; the tracker answers "do I already
//! have this datum" and records what is still missing. `outcome()` folds
//! both into the single wire event a trial pass emits.

use serde::Serialize;

use ptb_types::{
    Argument, Command, DiscoveredData, Input, InstructionGroup, LookupQuery, MoveTarget,
    ObjectAddr, ObjectRef, ResolutionOutcome, ResolveError, Result,
};

/// Typed index of an input slot. Only meaningful against the builder that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHandle {
    index: u16,
}

impl InputHandle {
    pub fn index(&self) -> u16 {
        self.index
    }
}

/// Typed index of a command plus its declared result arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    index: u16,
    arity: u16,
}

impl CommandResult {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn arity(&self) -> u16 {
        self.arity
    }
}

/// Accumulates inputs and commands; finalizes into one instruction group.
#[derive(Debug, Default)]
pub struct TxBuilder {
    inputs: Vec<Input>,
    commands: Vec<Command>,
    required_objects: Vec<ObjectAddr>,
    required_types: Vec<String>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_input(&mut self, input: Input) -> InputHandle {
        if let Some(addr) = input.object_address() {
            self.require_object(addr);
        }
        let index = self.inputs.len() as u16;
        self.inputs.push(input);
        InputHandle { index }
    }

    /// Add a pure input from already-canonical bytes.
    pub fn add_pure(&mut self, bytes: Vec<u8>, type_name: impl Into<String>) -> InputHandle {
        self.push_input(Input::Pure {
            bytes,
            type_name: type_name.into(),
        })
    }

    /// Add a pure input by encoding a value canonically.
    pub fn add_pure_value<T: Serialize>(
        &mut self,
        value: &T,
        type_name: impl Into<String>,
    ) -> Result<InputHandle> {
        let bytes = bcs::to_bytes(value)
            .map_err(|e| ResolveError::MalformedEncoding(e.to_string()))?;
        Ok(self.add_pure(bytes, type_name))
    }

    pub fn add_owned_object(&mut self, addr: ObjectAddr) -> InputHandle {
        self.push_input(Input::OwnedObject(addr))
    }

    pub fn add_shared_object(&mut self, addr: ObjectAddr) -> InputHandle {
        self.push_input(Input::SharedObject(addr))
    }

    pub fn add_receiving_object(&mut self, addr: ObjectAddr) -> InputHandle {
        self.push_input(Input::ReceivingObject(addr))
    }

    /// Record a ledger object the sequence depends on (deduplicated).
    pub fn require_object(&mut self, addr: ObjectAddr) {
        if !self.required_objects.contains(&addr) {
            self.required_objects.push(addr);
        }
    }

    /// Record a type string the sequence instantiates (deduplicated).
    pub fn require_type(&mut self, type_name: impl Into<String>) {
        let type_name = type_name.into();
        if !self.required_types.contains(&type_name) {
            self.required_types.push(type_name);
        }
    }

    /// Positional argument for an input handle.
    pub fn arg(&self, handle: InputHandle) -> Argument {
        Argument::Input(handle.index)
    }

    /// Positional argument for a single-result command.
    pub fn result(&self, result: CommandResult) -> Argument {
        Argument::Result(result.index)
    }

    /// Positional argument for one value of a multi-result command.
    pub fn nested_result(&self, result: CommandResult, nested: u16) -> Result<Argument> {
        if nested >= result.arity {
            return Err(ResolveError::Validation(format!(
                "nested result {nested} out of range for command {} with arity {}",
                result.index, result.arity
            )));
        }
        Ok(Argument::NestedResult(result.index, nested))
    }

    fn push_command(&mut self, command: Command) -> CommandResult {
        let index = self.commands.len() as u16;
        let arity = command.result_arity();
        self.commands.push(command);
        CommandResult { index, arity }
    }

    /// Append a call with the default result arity of 1.
    pub fn move_call(
        &mut self,
        target: MoveTarget,
        type_args: Vec<String>,
        args: Vec<Argument>,
    ) -> CommandResult {
        self.move_call_with_arity(target, type_args, args, 1)
    }

    /// Append a call declaring an explicit result arity.
    pub fn move_call_with_arity(
        &mut self,
        target: MoveTarget,
        type_args: Vec<String>,
        args: Vec<Argument>,
        result_arity: u16,
    ) -> CommandResult {
        self.require_object(target.package);
        for type_arg in &type_args {
            self.require_type(type_arg.clone());
        }
        self.push_command(Command::MoveCall {
            target,
            type_args,
            args,
            result_arity,
        })
    }

    pub fn transfer_objects(
        &mut self,
        objects: Vec<Argument>,
        recipient: Argument,
    ) -> CommandResult {
        self.push_command(Command::TransferObjects { objects, recipient })
    }

    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> CommandResult {
        self.push_command(Command::SplitCoins { coin, amounts })
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> CommandResult {
        self.push_command(Command::MergeCoins {
            destination,
            sources,
        })
    }

    pub fn make_vector(
        &mut self,
        element_type: Option<String>,
        elements: Vec<Argument>,
    ) -> CommandResult {
        if let Some(t) = &element_type {
            self.require_type(t.clone());
        }
        self.push_command(Command::MakeVector {
            element_type,
            elements,
        })
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Package accumulated state. Always produces exactly one group.
    pub fn finalize(self) -> InstructionGroup {
        InstructionGroup {
            inputs: self.inputs,
            commands: self.commands,
            required_objects: self.required_objects,
            required_types: self.required_types,
        }
    }
}

/// Tracks which requested data is already discovered and which is pending.
#[derive(Debug, Default)]
pub struct LookupTracker {
    discovered: DiscoveredData,
    pending: Vec<LookupQuery>,
    cumulative: Vec<LookupQuery>,
}

impl LookupTracker {
    pub fn new(discovered: DiscoveredData) -> Self {
        Self {
            discovered,
            pending: Vec::new(),
            cumulative: Vec::new(),
        }
    }

    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(DiscoveredData::decode(bytes)?))
    }

    /// Raw form of the request protocol: return the discovered bytes for
    /// the query's semantic key, or record the query and return `None`.
    pub fn request(&mut self, query: LookupQuery) -> Option<Vec<u8>> {
        if let Some(bytes) = self.discovered.lookup(&query.semantic_key) {
            return Some(bytes.to_vec());
        }
        self.pending.push(query.clone());
        self.cumulative.push(query);
        None
    }

    /// Request a datum expected to be a 32-byte address.
    pub fn request_address(&mut self, query: LookupQuery) -> Result<Option<ObjectAddr>> {
        let semantic_key = query.semantic_key.clone();
        match self.request(query) {
            None => Ok(None),
            Some(bytes) => ObjectAddr::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| ResolveError::type_mismatch(
                    "32-byte address",
                    format!("{} bytes", bytes.len()),
                    format!("discovered value `{semantic_key}`"),
                )),
        }
    }

    /// Request a datum expected to be UTF-8 text (e.g. a coin type).
    pub fn request_string(&mut self, query: LookupQuery) -> Result<Option<String>> {
        let semantic_key = query.semantic_key.clone();
        match self.request(query) {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                ResolveError::type_mismatch(
                    "UTF-8 string",
                    "non-UTF-8 bytes",
                    format!("discovered value `{semantic_key}`"),
                )
            }),
        }
    }

    /// Request a datum expected to be a packed object reference.
    pub fn request_object_ref(&mut self, query: LookupQuery) -> Result<Option<ObjectRef>> {
        match self.request(query) {
            None => Ok(None),
            Some(bytes) => ObjectRef::unpack(&bytes).map(Some),
        }
    }

    /// Request opaque bytes.
    pub fn request_bytes(&mut self, query: LookupQuery) -> Option<Vec<u8>> {
        self.request(query)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Lookups recorded this round, in request order.
    pub fn pending_for_resolution(&self) -> &[LookupQuery] {
        &self.pending
    }

    /// Every lookup this session has ever recorded, cleared or not.
    pub fn requested(&self) -> &[LookupQuery] {
        &self.cumulative
    }

    /// Empty the pending marker list. The cumulative list is retained.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn discovered(&self) -> &DiscoveredData {
        &self.discovered
    }
}

/// One round's session: builder plus tracker, folded into one wire event.
#[derive(Debug, Default)]
pub struct Session {
    pub builder: TxBuilder,
    pub lookups: LookupTracker,
}

impl Session {
    /// Start a fresh session seeded with the encoded discovered-data table.
    pub fn new(discovered_encoded: &[u8]) -> Result<Self> {
        Ok(Self {
            builder: TxBuilder::new(),
            lookups: LookupTracker::from_encoded(discovered_encoded)?,
        })
    }

    /// Fold the session into its outcome. Only the first pending lookup is
    /// surfaced per round; the rest stay recorded in the cumulative list
    /// and resurface on later rounds if still unresolved.
    pub fn outcome(self) -> Result<ResolutionOutcome> {
        match self.lookups.pending.first() {
            Some(query) => Ok(ResolutionOutcome::NeedsData(vec![query.to_event()?])),
            None => Ok(ResolutionOutcome::Resolved(self.builder.finalize())),
        }
    }

    /// Canonical bytes of the session outcome, as a trial pass emits them.
    pub fn emit(self) -> Result<Vec<u8>> {
        let outcome = self.outcome()?;
        ptb_types::codec::to_canonical_bytes(&outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptb_types::LookupKind;

    fn addr(n: u8) -> ObjectAddr {
        let mut raw = [0u8; 32];
        raw[31] = n;
        ObjectAddr(raw)
    }

    fn query(key: &str) -> LookupQuery {
        LookupQuery::new(
            key,
            addr(9),
            LookupKind::NestedPath {
                path: "config.value".into(),
            },
        )
    }

    #[test]
    fn handles_are_positional() {
        let mut b = TxBuilder::new();
        let pure = b.add_pure(vec![1], "u64");
        let obj = b.add_shared_object(addr(1));
        assert_eq!(b.arg(pure), Argument::Input(0));
        assert_eq!(b.arg(obj), Argument::Input(1));

        let call = b.move_call(
            MoveTarget::new(addr(2), "m", "f"),
            vec![],
            vec![b.arg(pure)],
        );
        assert_eq!(b.result(call), Argument::Result(0));
    }

    #[test]
    fn nested_result_is_arity_checked() {
        let mut b = TxBuilder::new();
        let amount = b.add_pure(vec![0; 8], "u64");
        let split = b.split_coins(Argument::Gas, vec![b.arg(amount), b.arg(amount)]);
        assert_eq!(
            b.nested_result(split, 1).unwrap(),
            Argument::NestedResult(0, 1)
        );
        assert!(matches!(
            b.nested_result(split, 2),
            Err(ResolveError::Validation(_))
        ));
    }

    #[test]
    fn finalize_deduplicates_required_sets() {
        let mut b = TxBuilder::new();
        b.add_shared_object(addr(1));
        b.add_shared_object(addr(1));
        b.move_call(
            MoveTarget::new(addr(2), "m", "f"),
            vec!["0x2::sui::SUI".into(), "0x2::sui::SUI".into()],
            vec![],
        );
        let group = b.finalize();
        assert_eq!(group.inputs.len(), 2);
        assert_eq!(group.required_objects, vec![addr(1), addr(2)]);
        assert_eq!(group.required_types, vec!["0x2::sui::SUI".to_string()]);
    }

    #[test]
    fn request_hits_discovered_without_side_effect() {
        let mut discovered = DiscoveredData::new();
        discovered.insert("k", vec![7, 7]);
        let mut tracker = LookupTracker::new(discovered);

        assert_eq!(tracker.request(query("k")), Some(vec![7, 7]));
        assert!(!tracker.has_pending());
        assert!(tracker.requested().is_empty());
    }

    #[test]
    fn request_miss_records_pending_and_cumulative() {
        let mut tracker = LookupTracker::new(DiscoveredData::new());
        assert_eq!(tracker.request(query("a")), None);
        assert_eq!(tracker.request(query("b")), None);
        assert!(tracker.has_pending());
        assert_eq!(tracker.pending_for_resolution().len(), 2);

        tracker.clear_pending();
        assert!(!tracker.has_pending());
        // Cumulative list survives the clear.
        assert_eq!(tracker.requested().len(), 2);
    }

    #[test]
    fn typed_request_rejects_wrong_shape() {
        let mut discovered = DiscoveredData::new();
        discovered.insert("short", vec![1, 2, 3]);
        let mut tracker = LookupTracker::new(discovered);
        assert!(matches!(
            tracker.request_address(query("short")),
            Err(ResolveError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn outcome_surfaces_only_first_pending() {
        let mut session = Session::new(&[]).unwrap();
        session.lookups.request(query("first"));
        session.lookups.request(query("second"));
        match session.outcome().unwrap() {
            ResolutionOutcome::NeedsData(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].semantic_key, "first");
            }
            other => panic!("expected NeedsData, got {other:?}"),
        }
    }

    #[test]
    fn outcome_resolves_when_nothing_pending() {
        let mut session = Session::new(&[]).unwrap();
        session.builder.add_pure(vec![1], "u64");
        match session.outcome().unwrap() {
            ResolutionOutcome::Resolved(group) => assert_eq!(group.inputs.len(), 1),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }
}
