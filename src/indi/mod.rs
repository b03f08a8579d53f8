//! Minimal sequential INDI client: define, wait, send.

pub mod protocol;

use crate::config::IndiSettings;
use protocol::DefinitionParser;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IndiError {
    #[error("cannot connect to INDI server at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("INDI connection error: {0}")]
    Io(#[from] io::Error),

    #[error("INDI XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{device}.{property} not defined within {secs} s")]
    Timeout {
        device: String,
        property: String,
        secs: u64,
    },

    #[error("INDI server closed the connection")]
    Closed,

    #[error("{device}.{property} has no element {element}")]
    UnknownElement {
        device: String,
        property: String,
        element: String,
    },

    #[error("{device}.{property} is read only")]
    ReadOnly { device: String, property: String },
}

pub type IndiResult<T> = Result<T, IndiError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Switch,
    Number,
    Text,
    Light,
    Blob,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub device: String,
    pub name: String,
    pub kind: PropertyKind,
    pub perm: String,
    /// (element name, value as sent by the server)
    pub elements: Vec<(String, String)>,
}

impl PropertyDef {
    pub fn value(&self, element: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|(n, _)| n == element)
            .map(|(_, v)| v.as_str())
    }

    fn check_writable(&self, elements: &[&str]) -> IndiResult<()> {
        if self.perm == "ro" {
            return Err(IndiError::ReadOnly {
                device: self.device.clone(),
                property: self.name.clone(),
            });
        }
        match elements.iter().find(|e| self.value(e).is_none()) {
            Some(missing) => Err(IndiError::UnknownElement {
                device: self.device.clone(),
                property: self.name.clone(),
                element: missing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub struct IndiSession<S> {
    reader: Reader<BufReader<ReadHalf<S>>>,
    writer: WriteHalf<S>,
    buf: Vec<u8>,
    parser: DefinitionParser,
    properties: HashMap<(String, String), PropertyDef>,
}

impl IndiSession<TcpStream> {
    pub async fn connect(host: &str, port: u16) -> IndiResult<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| IndiError::Connect {
                addr: addr.clone(),
                source,
            })?;
        info!("Connected to INDI server at {}", addr);
        Self::start(stream).await
    }

    pub async fn connect_with(settings: &IndiSettings, port: Option<u16>) -> IndiResult<Self> {
        Self::connect(&settings.host, port.unwrap_or(settings.port)).await
    }
}

impl<S: AsyncRead + AsyncWrite> IndiSession<S> {
    /// Takes over an open stream and asks the server for its properties.
    pub async fn start(stream: S) -> IndiResult<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = Reader::from_reader(BufReader::new(read_half));
        reader.trim_text(true);

        let mut session = Self {
            reader,
            writer: write_half,
            buf: Vec::new(),
            parser: DefinitionParser::default(),
            properties: HashMap::new(),
        };
        session.send(&protocol::get_properties()).await?;
        Ok(session)
    }

    async fn send(&mut self, xml: &str) -> IndiResult<()> {
        debug!("INDI -> {}", xml);
        self.writer.write_all(xml.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads until the next property definition arrives.
    async fn next_definition(&mut self) -> IndiResult<PropertyDef> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into_async(&mut self.buf).await?;
            if let Event::Eof = event {
                return Err(IndiError::Closed);
            }
            if let Some(def) = self.parser.feed(&event) {
                debug!("INDI defined {}.{}", def.device, def.name);
                self.properties
                    .insert((def.device.clone(), def.name.clone()), def.clone());
                return Ok(def);
            }
        }
    }

    async fn find_property(&mut self, device: &str, property: &str) -> IndiResult<PropertyDef> {
        loop {
            let def = self.next_definition().await?;
            if def.device == device && def.name == property {
                return Ok(def);
            }
        }
    }

    pub fn property(&self, device: &str, property: &str) -> Option<&PropertyDef> {
        self.properties
            .get(&(device.to_string(), property.to_string()))
    }

    /// Waits up to `wait` for the server to define `device.property`.
    pub async fn wait_for_property(
        &mut self,
        device: &str,
        property: &str,
        wait: Duration,
    ) -> IndiResult<PropertyDef> {
        if let Some(def) = self.property(device, property) {
            return Ok(def.clone());
        }

        match tokio::time::timeout(wait, self.find_property(device, property)).await {
            Ok(result) => result,
            Err(_) => Err(IndiError::Timeout {
                device: device.to_string(),
                property: property.to_string(),
                secs: wait.as_secs(),
            }),
        }
    }

    pub async fn set_switches(
        &mut self,
        device: &str,
        property: &str,
        switches: &[(&str, bool)],
    ) -> IndiResult<()> {
        if let Some(def) = self.property(device, property) {
            let names: Vec<&str> = switches.iter().map(|(n, _)| *n).collect();
            def.check_writable(&names)?;
        }
        self.send(&protocol::new_switch_vector(device, property, switches))
            .await
    }

    pub async fn set_switch(
        &mut self,
        device: &str,
        property: &str,
        element: &str,
        on: bool,
    ) -> IndiResult<()> {
        self.set_switches(device, property, &[(element, on)]).await
    }

    pub async fn set_numbers(
        &mut self,
        device: &str,
        property: &str,
        values: &[(&str, f64)],
    ) -> IndiResult<()> {
        if let Some(def) = self.property(device, property) {
            let names: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
            def.check_writable(&names)?;
        }
        self.send(&protocol::new_number_vector(device, property, values))
            .await
    }
}
