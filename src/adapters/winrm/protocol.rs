//! WS-Management message format for the WinRM shell session.
//!
//! The four exchanges (Create, Command, Receive, Delete) have a fixed shape;
//! envelopes are rendered from templates and responses are read with
//! lightweight tag scanning. The registry key path, value name, and payload
//! bytes travel base64-encoded inside single-quoted PowerShell string
//! literals, so externally-supplied data can never be parsed as code.

use base64::Engine;
use std::time::Duration;
use uuid::Uuid;

const SOAP_NS: &str = r#"xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd" xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell""#;

const SHELL_RESOURCE_URI: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";

const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";

const ANONYMOUS_ADDRESS: &str =
    "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

/// Marker printed by the remote get pipeline when the value is not set.
pub const ABSENT_SENTINEL: &str = "__ABSENT__";

/// Marker printed by the remote set/delete pipelines on success.
pub const DONE_SENTINEL: &str = "__DONE__";

/// Escape text for embedding in XML element or attribute content.
#[must_use]
pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn header(
    endpoint: &str,
    action: &str,
    message_id: &Uuid,
    timeout: Duration,
    extra: &str,
) -> String {
    format!(
        "<s:Header>\
         <a:To>{to}</a:To>\
         <a:ReplyTo><a:Address s:mustUnderstand=\"true\">{anon}</a:Address></a:ReplyTo>\
         <w:ResourceURI s:mustUnderstand=\"true\">{resource}</w:ResourceURI>\
         <a:Action s:mustUnderstand=\"true\">{action}</a:Action>\
         <a:MessageID>uuid:{id}</a:MessageID>\
         <w:MaxEnvelopeSize s:mustUnderstand=\"true\">512000</w:MaxEnvelopeSize>\
         <w:OperationTimeout>PT{secs}S</w:OperationTimeout>\
         {extra}\
         </s:Header>",
        to = xml_escape(endpoint),
        anon = ANONYMOUS_ADDRESS,
        resource = SHELL_RESOURCE_URI,
        action = action,
        id = message_id,
        secs = timeout.as_secs().max(1),
        extra = extra,
    )
}

fn shell_selector(shell_id: &str) -> String {
    format!(
        "<w:SelectorSet><w:Selector Name=\"ShellId\">{}</w:Selector></w:SelectorSet>",
        xml_escape(shell_id)
    )
}

fn envelope(header: &str, body: &str) -> String {
    format!("<s:Envelope {SOAP_NS}>{header}<s:Body>{body}</s:Body></s:Envelope>")
}

/// Envelope creating a new remote shell with stdout/stderr streams.
#[must_use]
pub fn build_create_shell(endpoint: &str, message_id: &Uuid, timeout: Duration) -> String {
    let options = "<w:OptionSet>\
                   <w:Option Name=\"WINRS_NOPROFILE\">TRUE</w:Option>\
                   <w:Option Name=\"WINRS_CODEPAGE\">65001</w:Option>\
                   </w:OptionSet>";
    let header = header(
        endpoint,
        ACTION_CREATE,
        message_id,
        timeout,
        options,
    );
    let body = "<rsp:Shell>\
                <rsp:InputStreams>stdin</rsp:InputStreams>\
                <rsp:OutputStreams>stdout stderr</rsp:OutputStreams>\
                </rsp:Shell>";
    envelope(&header, body)
}

/// Envelope launching `powershell.exe` in an existing shell with the encoded
/// pipeline as its argument list.
#[must_use]
pub fn build_run_command(
    endpoint: &str,
    shell_id: &str,
    message_id: &Uuid,
    timeout: Duration,
    encoded_command: &str,
) -> String {
    let extra = shell_selector(shell_id);
    let header = header(endpoint, ACTION_COMMAND, message_id, timeout, &extra);
    let body = format!(
        "<rsp:CommandLine>\
         <rsp:Command>powershell.exe</rsp:Command>\
         <rsp:Arguments>-NoProfile</rsp:Arguments>\
         <rsp:Arguments>-NonInteractive</rsp:Arguments>\
         <rsp:Arguments>-EncodedCommand</rsp:Arguments>\
         <rsp:Arguments>{}</rsp:Arguments>\
         </rsp:CommandLine>",
        xml_escape(encoded_command)
    );
    envelope(&header, &body)
}

/// Envelope requesting buffered output for a running command.
#[must_use]
pub fn build_receive(
    endpoint: &str,
    shell_id: &str,
    command_id: &str,
    message_id: &Uuid,
    timeout: Duration,
) -> String {
    let extra = shell_selector(shell_id);
    let header = header(endpoint, ACTION_RECEIVE, message_id, timeout, &extra);
    let body = format!(
        "<rsp:Receive><rsp:DesiredStream CommandId=\"{}\">stdout stderr</rsp:DesiredStream></rsp:Receive>",
        xml_escape(command_id)
    );
    envelope(&header, &body)
}

/// Envelope tearing the shell down.
#[must_use]
pub fn build_delete_shell(
    endpoint: &str,
    shell_id: &str,
    message_id: &Uuid,
    timeout: Duration,
) -> String {
    let extra = shell_selector(shell_id);
    let header = header(endpoint, ACTION_DELETE, message_id, timeout, &extra);
    envelope(&header, "")
}

/// Text content of the first element whose local name is `local`, ignoring
/// the namespace prefix.
#[must_use]
pub fn tag_text(xml: &str, local: &str) -> Option<String> {
    let open = format!(":{local}");
    let mut search = 0;
    while let Some(pos) = xml[search..].find(&open) {
        let at = search + pos;
        let rest = &xml[at + open.len()..];
        // Opening tag only: the match must be followed by '>' or an attribute.
        let next = rest.chars().next()?;
        if next == '>' || next == ' ' {
            // Reject closing tags (`</ns:local>`).
            let tag_start = xml[..at].rfind('<')?;
            if xml[tag_start..].starts_with("</") {
                search = at + open.len();
                continue;
            }
            let content_start = at + open.len() + rest.find('>')? + 1;
            let content_end = content_start + xml[content_start..].find('<')?;
            return Some(xml[content_start..content_end].to_string());
        }
        search = at + open.len();
    }
    None
}

/// Shell identifier from a CreateShell response.
#[must_use]
pub fn extract_shell_id(xml: &str) -> Option<String> {
    const SELECTOR: &str = "Name=\"ShellId\">";
    if let Some(pos) = xml.find(SELECTOR) {
        let start = pos + SELECTOR.len();
        let end = start + xml[start..].find('<')?;
        return Some(xml[start..end].to_string());
    }
    tag_text(xml, "ShellId")
}

/// Command identifier from a Command response.
#[must_use]
pub fn extract_command_id(xml: &str) -> Option<String> {
    tag_text(xml, "CommandId")
}

/// Concatenated, decoded content of every named stream block in a Receive
/// response.
#[must_use]
pub fn extract_stream(xml: &str, stream: &str) -> Vec<u8> {
    let marker = format!("Stream Name=\"{stream}\"");
    let mut out = Vec::new();
    let mut search = 0;
    while let Some(pos) = xml[search..].find(&marker) {
        let at = search + pos + marker.len();
        let Some(close) = xml[at..].find('>') else {
            break;
        };
        let content_start = at + close + 1;
        search = content_start;
        if xml[..content_start].ends_with("/>") {
            continue; // self-closing end-of-stream block
        }
        let Some(len) = xml[content_start..].find('<') else {
            break;
        };
        let chunk = xml[content_start..content_start + len].trim();
        if chunk.is_empty() {
            continue;
        }
        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(chunk) {
            out.extend_from_slice(&bytes);
        }
        search = content_start + len;
    }
    out
}

/// Whether the Receive response reports the command as finished.
#[must_use]
pub fn command_done(xml: &str) -> bool {
    xml.contains("CommandState/Done")
}

/// Exit code from a finished command, when present.
#[must_use]
pub fn extract_exit_code(xml: &str) -> Option<i64> {
    tag_text(xml, "ExitCode").and_then(|t| t.trim().parse().ok())
}

/// Fault reason text when the response is a SOAP fault.
#[must_use]
pub fn extract_fault(xml: &str) -> Option<String> {
    if !xml.contains(":Fault>") {
        return None;
    }
    Some(
        tag_text(xml, "Text")
            .or_else(|| tag_text(xml, "Reason"))
            .unwrap_or_else(|| "unspecified WS-Management fault".to_string()),
    )
}

/// Base64 of the UTF-16LE script, the form `powershell -EncodedCommand`
/// expects.
#[must_use]
pub fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(utf16)
}

/// Base64 wrapping for data smuggled into a single-quoted PowerShell literal.
/// The base64 alphabet contains no quote characters, so the payload cannot
/// break out of the literal.
fn b64_text(text: &str) -> String {
    let utf16: Vec<u8> = text
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(utf16)
}

fn script_prologue(key_path: &str, value_name: &str) -> String {
    format!(
        "$ErrorActionPreference='Stop';\
         $k=[Text.Encoding]::Unicode.GetString([Convert]::FromBase64String('{}'));\
         $n=[Text.Encoding]::Unicode.GetString([Convert]::FromBase64String('{}'));\
         $p='HKLM:\\'+$k;",
        b64_text(key_path),
        b64_text(value_name),
    )
}

/// Pipeline printing the value bytes base64-encoded, or the absent sentinel.
#[must_use]
pub fn get_script(key_path: &str, value_name: &str) -> String {
    format!(
        "{}$it=Get-ItemProperty -Path $p -Name $n -ErrorAction SilentlyContinue;\
         if($null -eq $it){{'{ABSENT_SENTINEL}'}}\
         else{{[Convert]::ToBase64String([byte[]]$it.$n)}}",
        script_prologue(key_path, value_name),
    )
}

/// Pipeline writing the payload as a REG_BINARY value, creating the key if
/// absent.
#[must_use]
pub fn set_script(key_path: &str, value_name: &str, bytes: &[u8]) -> String {
    format!(
        "{}$b=[Convert]::FromBase64String('{}');\
         if(-not (Test-Path -Path $p)){{New-Item -Path $p -Force | Out-Null}};\
         New-ItemProperty -Path $p -Name $n -Value ([byte[]]$b) -PropertyType Binary -Force | Out-Null;\
         '{DONE_SENTINEL}'",
        script_prologue(key_path, value_name),
        base64::engine::general_purpose::STANDARD.encode(bytes),
    )
}

/// Pipeline removing the value; a missing value or key is already success.
#[must_use]
pub fn delete_script(key_path: &str, value_name: &str) -> String {
    format!(
        "{}if($null -ne (Get-ItemProperty -Path $p -Name $n -ErrorAction SilentlyContinue))\
         {{Remove-ItemProperty -Path $p -Name $n -ErrorAction Stop}};\
         '{DONE_SENTINEL}'",
        script_prologue(key_path, value_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TIMEOUT: Duration = Duration::from_secs(30);

    fn endpoint() -> &'static str {
        "http://ca01.contoso.com:5985/wsman"
    }

    #[test]
    fn create_envelope_carries_action_and_streams() {
        let id = Uuid::nil();
        let xml = build_create_shell(endpoint(), &id, TEST_TIMEOUT);
        assert!(xml.contains(ACTION_CREATE));
        assert!(xml.contains("<rsp:OutputStreams>stdout stderr</rsp:OutputStreams>"));
        assert!(xml.contains("uuid:00000000-0000-0000-0000-000000000000"));
        assert!(xml.contains("PT30S"));
    }

    #[test]
    fn command_envelope_passes_pipeline_as_argument() {
        let id = Uuid::nil();
        let xml = build_run_command(endpoint(), "SHELL-1", &id, TEST_TIMEOUT, "QQBiAA==");
        assert!(xml.contains("<rsp:Arguments>-EncodedCommand</rsp:Arguments>"));
        assert!(xml.contains("<rsp:Arguments>QQBiAA==</rsp:Arguments>"));
        assert!(xml.contains("Name=\"ShellId\">SHELL-1<"));
    }

    #[test]
    fn xml_escaping_covers_metacharacters() {
        assert_eq!(xml_escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn shell_id_extraction_prefers_selector() {
        let xml = r#"<w:SelectorSet><w:Selector Name="ShellId">FB-42</w:Selector></w:SelectorSet>"#;
        assert_eq!(extract_shell_id(xml).as_deref(), Some("FB-42"));

        let xml = "<rsp:Shell><rsp:ShellId>AA-7</rsp:ShellId></rsp:Shell>";
        assert_eq!(extract_shell_id(xml).as_deref(), Some("AA-7"));
    }

    #[test]
    fn stream_extraction_concatenates_blocks() {
        let xml = concat!(
            r#"<rsp:Stream Name="stdout" CommandId="C1">aGVs</rsp:Stream>"#,
            r#"<rsp:Stream Name="stderr" CommandId="C1">eHh4</rsp:Stream>"#,
            r#"<rsp:Stream Name="stdout" CommandId="C1">bG8=</rsp:Stream>"#,
            r#"<rsp:Stream Name="stdout" CommandId="C1" End="true"/>"#,
        );
        assert_eq!(extract_stream(xml, "stdout"), b"hello");
        assert_eq!(extract_stream(xml, "stderr"), b"xxx");
    }

    #[test]
    fn command_state_and_exit_code() {
        let xml = concat!(
            r#"<rsp:CommandState CommandId="C1" State="http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Done">"#,
            "<rsp:ExitCode>0</rsp:ExitCode></rsp:CommandState>",
        );
        assert!(command_done(xml));
        assert_eq!(extract_exit_code(xml), Some(0));
    }

    #[test]
    fn fault_reason_is_extracted() {
        let xml = concat!(
            "<s:Fault><s:Reason>",
            r#"<s:Text xml:lang="en-US">The WS-Management service cannot process the request.</s:Text>"#,
            "</s:Reason></s:Fault>",
        );
        let fault = extract_fault(xml).unwrap();
        assert!(fault.contains("cannot process"));
        assert_eq!(extract_fault("<s:Envelope></s:Envelope>"), None);
    }

    #[test]
    fn scripts_embed_data_encoded_not_raw() {
        let key = r"SOFTWARE\Contoso's Key";
        let script = get_script(key, "Value<Name>");
        // Quotes and angle brackets are outside the base64 alphabet, so the
        // raw path and value cannot appear in the pipeline text.
        assert!(!script.contains("Contoso's"));
        assert!(!script.contains("Value<Name>"));
        assert!(script.contains("FromBase64String"));
        assert!(script.contains(ABSENT_SENTINEL));
    }

    #[test]
    fn set_script_carries_payload_base64() {
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let script = set_script(r"SOFTWARE\X", "V", &payload);
        let b64 = base64::engine::general_purpose::STANDARD.encode(payload);
        assert!(script.contains(&b64));
        assert!(script.contains("PropertyType Binary"));
        assert!(script.contains(DONE_SENTINEL));
    }

    #[test]
    fn encoded_command_round_trips_utf16() {
        let encoded = encode_powershell("Ab");
        // 'A' 0x41 0x00, 'b' 0x62 0x00
        assert_eq!(encoded, "QQBiAA==");
    }
}
